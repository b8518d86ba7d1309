pub mod inspect;
pub mod score;
pub mod train;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::warn;

use fieldembed::config::FieldEmbedConfig;
use fieldembed::{store, EmbeddingNetwork, SimilarityScorer};

/// Field pairs printed after training to show what the model learned.
const SAMPLE_PAIRS: &[(&str, &str)] = &[
    ("firstName", "first_name"),
    ("ssn", "social_security_number"),
    ("emailAddress", "email"),
    ("firstName", "accountNumber"),
];

/// The `--model` override if given, else the configured path.
pub fn model_path(config: &FieldEmbedConfig, overridden: Option<&Path>) -> PathBuf {
    overridden
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.resolved_model_path())
}

/// Load the model at `path`. `Ok(None)` when no file exists there.
pub fn load_network(path: &Path) -> Result<Option<EmbeddingNetwork>> {
    if !path.exists() {
        return Ok(None);
    }
    let network = store::load(path)
        .with_context(|| format!("failed to load model from {}", path.display()))?;
    Ok(Some(network))
}

/// Scorer backed by the model at `path`, or lexical-only when it is absent.
pub fn load_scorer(path: &Path) -> Result<SimilarityScorer> {
    let network = load_network(path)?;
    if network.is_none() {
        warn!(
            "no model at {}, falling back to lexical scoring (run `fieldembed train`)",
            path.display()
        );
    }
    Ok(SimilarityScorer::from_optional(network))
}

/// Progress bar over `len` epochs.
pub fn epoch_progress(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} epochs ({eta}) {msg}")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

/// Print neural and blended scores for [`SAMPLE_PAIRS`].
pub fn print_sample_scores(scorer: &SimilarityScorer) {
    println!("Sample similarities:");
    for (a, b) in SAMPLE_PAIRS {
        let breakdown = scorer.score_breakdown(a, b);
        match breakdown.neural {
            Some(neural) => println!(
                "  {a:<14} ~ {b:<24} neural {neural:.3}  score {:.3}",
                breakdown.score
            ),
            None => println!("  {a:<14} ~ {b:<24} score {:.3}", breakdown.score),
        }
    }
}
