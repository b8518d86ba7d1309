mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fieldembed::config::FieldEmbedConfig;

#[derive(Parser)]
#[command(
    name = "fieldembed",
    version,
    about = "Neural field-name embeddings for cross-convention field matching"
)]
struct Cli {
    /// Config file (defaults to ~/.fieldembed/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on the builtin corpus or a pairs file
    Train(cli::train::TrainArgs),
    /// Save a model with directly assigned weights, skipping training
    Pretrained {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score the similarity of two field names
    Score {
        a: String,
        b: String,
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Rank candidate field names against a target
    Match {
        target: String,
        #[arg(required = true)]
        candidates: Vec<String>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        top: Option<usize>,
        /// Print matches as JSON
        #[arg(long)]
        json: bool,
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Suggest mappings between two JSON arrays of field names
    Suggest {
        targets: PathBuf,
        candidates: PathBuf,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Print the embedding vector of a field name
    Embed {
        name: String,
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Show details of a saved model
    Inspect {
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FieldEmbedConfig::load_from(path)?,
        None => FieldEmbedConfig::load()?,
    };

    // Log to stderr so stdout stays clean for JSON output.
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Train(args) => cli::train::train(&config, args)?,
        Command::Pretrained { seed, output } => {
            cli::train::pretrained(&config, seed, output.as_deref())?
        }
        Command::Score { a, b, model } => cli::score::score(&config, &a, &b, model.as_deref())?,
        Command::Match {
            target,
            candidates,
            threshold,
            top,
            json,
            model,
        } => cli::score::find_matches(
            &config,
            &target,
            &candidates,
            threshold,
            top,
            json,
            model.as_deref(),
        )?,
        Command::Suggest {
            targets,
            candidates,
            threshold,
            model,
        } => cli::score::suggest(&config, &targets, &candidates, threshold, model.as_deref())?,
        Command::Embed { name, model } => cli::score::embed(&config, &name, model.as_deref())?,
        Command::Inspect { model } => cli::inspect::inspect(&config, model.as_deref())?,
    }

    Ok(())
}
