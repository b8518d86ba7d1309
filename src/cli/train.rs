//! CLI `train` and `pretrained` commands.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use fieldembed::config::FieldEmbedConfig;
use fieldembed::{store, EmbeddingNetwork, PairSet, SimilarityScorer, Trainer};

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// JSON file of `{"similar": [[a, b], ...], "dissimilar": [[a, b], ...]}`
    /// (defaults to the builtin demographic corpus)
    #[arg(long)]
    pub pairs: Option<PathBuf>,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long)]
    pub learning_rate: Option<f32>,
    #[arg(long)]
    pub margin: Option<f32>,
    /// Seed for weight initialisation and corpus shuffling
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub max_similar: Option<usize>,
    #[arg(long)]
    pub max_dissimilar: Option<usize>,
    /// Average gradients over each epoch instead of updating per pair
    #[arg(long)]
    pub accumulate: bool,
    /// Where to write the model (defaults to the configured model path)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

fn read_pairs(path: &Path) -> Result<PairSet> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pairs file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse pairs JSON: {}", path.display()))
}

/// Train a fresh network and save it.
pub fn train(config: &FieldEmbedConfig, args: TrainArgs) -> Result<()> {
    let mut settings = config.training.clone();
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    if let Some(epochs) = args.epochs {
        settings.epochs = epochs;
    }
    if let Some(lr) = args.learning_rate {
        settings.learning_rate = lr;
    }
    if let Some(margin) = args.margin {
        settings.margin = margin;
    }
    if args.accumulate {
        settings.accumulate = true;
    }

    let pairs = match &args.pairs {
        Some(path) => {
            let mut pairs = read_pairs(path)?;
            pairs.truncate(
                args.max_similar.unwrap_or(usize::MAX),
                args.max_dissimilar.unwrap_or(usize::MAX),
            );
            pairs
        }
        None => {
            if let Some(max) = args.max_similar {
                settings.max_similar = max;
            }
            if let Some(max) = args.max_dissimilar {
                settings.max_dissimilar = max;
            }
            settings.builtin_pairs()
        }
    };
    anyhow::ensure!(!pairs.is_empty(), "no training pairs");

    let training = settings.training_config();
    let trainer = Trainer::new(training)?;
    let mut network = EmbeddingNetwork::new(config.network, settings.seed)?;

    println!(
        "Training on {} similar / {} dissimilar pairs ({} epochs, {} updates)",
        pairs.similar.len(),
        pairs.dissimilar.len(),
        training.epochs,
        training.mode
    );

    let pb = super::epoch_progress(training.epochs as u64)?;
    let report = trainer.train_with_progress(
        &mut network,
        &pairs.similar,
        &pairs.dissimilar,
        |stats| {
            pb.set_message(format!("loss {:.4}", stats.average_loss));
            pb.inc(1);
        },
    )?;
    pb.finish_and_clear();

    if let Some(loss) = report.final_loss() {
        println!("Final average loss: {loss:.4}");
    }
    if report.is_collapsed() {
        println!(
            "Warning: {} of {} training names embed to a zero vector",
            report.collapsed_names, report.names
        );
        println!("Retrain with a lower --learning-rate");
    }

    let output = super::model_path(config, args.output.as_deref());
    store::save(&network, &output)
        .with_context(|| format!("failed to save model to {}", output.display()))?;
    println!("Model saved to {}", output.display());
    println!();

    super::print_sample_scores(&SimilarityScorer::new(network));
    Ok(())
}

/// Save a network with directly assigned small-scale weights.
pub fn pretrained(
    config: &FieldEmbedConfig,
    seed: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let network = EmbeddingNetwork::pretrained(config.network, seed.unwrap_or(42))?;
    let output = super::model_path(config, output);
    store::save(&network, &output)
        .with_context(|| format!("failed to save model to {}", output.display()))?;
    println!("Pretrained model saved to {}", output.display());
    Ok(())
}
