//! CLI scoring commands: `score`, `match`, `suggest`, `embed`.

use anyhow::{Context, Result};
use std::path::Path;

use fieldembed::config::FieldEmbedConfig;
use fieldembed::MatchType;

/// Score one pair and print its signal breakdown.
pub fn score(config: &FieldEmbedConfig, a: &str, b: &str, model: Option<&Path>) -> Result<()> {
    let scorer = super::load_scorer(&super::model_path(config, model))?;
    let breakdown = scorer.score_breakdown(a, b);
    let w = breakdown.weights;

    println!("{a} ~ {b}");
    println!("{}", "=".repeat(40));
    if breakdown.exact {
        println!("  Exact match (case-insensitive)");
    } else {
        if let Some(neural) = breakdown.neural {
            println!("  Neural:      {neural:.4}  (x{:.1})", w.neural);
        }
        println!("  Edit:        {:.4}  (x{:.1})", breakdown.edit, w.edit);
        if w.ngram > 0.0 {
            println!("  N-gram:      {:.4}  (x{:.1})", breakdown.ngram, w.ngram);
        }
        println!("  Token:       {:.4}  (x{:.1})", breakdown.token, w.token);
    }
    println!("  Score:       {:.4}", breakdown.score);
    Ok(())
}

/// Rank `candidates` against `target`.
pub fn find_matches(
    config: &FieldEmbedConfig,
    target: &str,
    candidates: &[String],
    threshold: Option<f32>,
    top_n: Option<usize>,
    json: bool,
    model: Option<&Path>,
) -> Result<()> {
    let scorer = super::load_scorer(&super::model_path(config, model))?;
    let matches = scorer.find_similar(
        target,
        candidates,
        threshold.unwrap_or(config.matching.threshold),
        top_n.unwrap_or(config.matching.top_n),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No candidates matched {target}");
        return Ok(());
    }
    println!("Matches for {target}:");
    for (rank, m) in matches.iter().enumerate() {
        let kind = match m.match_type {
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
        };
        println!("  {:>2}. {:<30} {:.4}  {kind}", rank + 1, m.field, m.similarity);
    }
    Ok(())
}

fn read_names(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("expected a JSON array of field names in {}", path.display()))
}

/// Print a JSON mapping report from target fields to candidate fields.
pub fn suggest(
    config: &FieldEmbedConfig,
    targets: &Path,
    candidates: &Path,
    threshold: Option<f32>,
    model: Option<&Path>,
) -> Result<()> {
    let targets = read_names(targets)?;
    let candidates = read_names(candidates)?;
    let scorer = super::load_scorer(&super::model_path(config, model))?;

    let report = scorer.suggest_mappings(
        &targets,
        &candidates,
        threshold.unwrap_or(config.matching.threshold),
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Print the embedding of `name` as a JSON array.
pub fn embed(config: &FieldEmbedConfig, name: &str, model: Option<&Path>) -> Result<()> {
    let path = super::model_path(config, model);
    let network = super::load_network(&path)?.with_context(|| {
        format!(
            "no model at {}; run `fieldembed train` or `fieldembed pretrained` first",
            path.display()
        )
    })?;
    println!("{}", serde_json::to_string(&network.embed(name))?);
    Ok(())
}
