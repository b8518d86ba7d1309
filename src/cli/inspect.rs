//! CLI `inspect` command: display the metadata of a saved model.

use anyhow::{Context, Result};
use std::path::Path;

use fieldembed::config::FieldEmbedConfig;
use fieldembed::store;

/// Validate the model artifact and print its details.
pub fn inspect(config: &FieldEmbedConfig, model: Option<&Path>) -> Result<()> {
    let path = super::model_path(config, model);
    let info = store::inspect(&path)
        .with_context(|| format!("failed to inspect model at {}", path.display()))?;

    let c = &info.config;
    println!("Model: {}", path.display());
    println!("{}", "=".repeat(50));
    println!("  Format version: {}", info.version);
    println!("  Saved at:       {}", info.saved_at);
    println!("  Trained:        {}", info.trained);
    println!(
        "  Layers:         {} -> {} -> {} -> {}",
        c.input_dim, c.hidden1_dim, c.hidden2_dim, c.embedding_dim
    );
    println!("  Parameters:     {}", info.parameter_count);
    println!(
        "  Vocabulary:     {:?} ({} symbols)",
        info.vocabulary,
        info.vocabulary.chars().count()
    );
    println!("  File size:      {} bytes", info.size_bytes);
    Ok(())
}
