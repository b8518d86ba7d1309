use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::embedding::NetworkConfig;
use crate::training::corpus::demographic_pairs;
use crate::training::{PairSet, TrainingConfig, TrainingMode};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FieldEmbedConfig {
    pub logging: LoggingConfig,
    pub model: ModelConfig,
    pub network: NetworkConfig,
    pub training: TrainingSettings,
    pub matching: MatchingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrainingSettings {
    pub epochs: usize,
    pub learning_rate: f32,
    pub margin: f32,
    pub log_every: usize,
    pub seed: u64,
    /// Cap on similar pairs taken from the front of the builtin corpus.
    pub max_similar: usize,
    pub max_dissimilar: usize,
    pub accumulate: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    pub threshold: f32,
    pub top_n: usize,
}

impl Default for FieldEmbedConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            model: ModelConfig::default(),
            network: NetworkConfig::default(),
            training: TrainingSettings::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let path = default_fieldembed_dir()
            .join("models")
            .join("field_model.bin")
            .to_string_lossy()
            .into_owned();
        Self { path }
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs: 150,
            learning_rate: 0.005,
            margin: 0.55,
            log_every: 25,
            seed: 42,
            // Above the builtin corpus size: every similar pair is used.
            max_similar: 2000,
            max_dissimilar: 1000,
            accumulate: false,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            top_n: 5,
        }
    }
}

impl TrainingSettings {
    /// The builtin demographic corpus shuffled with `seed` and cut to the
    /// configured caps.
    pub fn builtin_pairs(&self) -> PairSet {
        let mut pairs = demographic_pairs(self.seed);
        pairs.truncate(self.max_similar, self.max_dissimilar);
        pairs
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            margin: self.margin,
            log_every: self.log_every,
            mode: if self.accumulate {
                TrainingMode::Accumulated
            } else {
                TrainingMode::Sequential
            },
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns `~/.fieldembed/`
pub fn default_fieldembed_dir() -> PathBuf {
    home_dir().join(".fieldembed")
}

/// Returns the default config file path: `~/.fieldembed/config.toml`
pub fn default_config_path() -> PathBuf {
    default_fieldembed_dir().join("config.toml")
}

impl FieldEmbedConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            FieldEmbedConfig::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (FIELDEMBED_MODEL, FIELDEMBED_LOG_LEVEL, FIELDEMBED_SEED).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("FIELDEMBED_MODEL") {
            self.model.path = val;
        }
        if let Ok(val) = std::env::var("FIELDEMBED_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("FIELDEMBED_SEED") {
            self.training.seed = val
                .trim()
                .parse()
                .with_context(|| format!("FIELDEMBED_SEED is not an integer: {val:?}"))?;
        }
        Ok(())
    }

    /// Resolve the model path, expanding `~` if needed.
    pub fn resolved_model_path(&self) -> PathBuf {
        expand_tilde(&self.model.path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FieldEmbedConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.training.epochs, 150);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.matching.top_n, 5);
        assert!(config.model.path.ends_with("field_model.bin"));
        assert!(config.training.training_config().validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[logging]
level = "debug"

[model]
path = "/tmp/model.bin"

[network]
embedding_dim = 16

[training]
epochs = 10
accumulate = true
"#;
        let config: FieldEmbedConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.model.path, "/tmp/model.bin");
        assert_eq!(config.network.embedding_dim, 16);
        assert_eq!(config.training.epochs, 10);
        assert_eq!(
            config.training.training_config().mode,
            TrainingMode::Accumulated
        );
        // defaults still apply for unset fields
        assert_eq!(config.network.hidden1_dim, 128);
        assert_eq!(config.training.learning_rate, 0.005);
        assert_eq!(config.matching.threshold, 0.6);
    }

    #[test]
    fn builtin_pairs_follow_the_caps() {
        let settings = TrainingSettings::default();
        let all = demographic_pairs(settings.seed);
        let pairs = settings.builtin_pairs();
        assert_eq!(pairs.similar, all.similar);
        assert_eq!(pairs.dissimilar.len(), settings.max_dissimilar);

        let small = TrainingSettings {
            max_similar: 5,
            max_dissimilar: 3,
            ..TrainingSettings::default()
        };
        let pairs = small.builtin_pairs();
        assert_eq!(pairs.similar.len(), 5);
        assert_eq!(pairs.dissimilar.len(), 3);
        assert_eq!(pairs.similar[..], all.similar[..5]);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FieldEmbedConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.matching.top_n, 5);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[training]\nepochs = \"many\"\n").unwrap();
        assert!(FieldEmbedConfig::load_from(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = FieldEmbedConfig::default();
        std::env::set_var("FIELDEMBED_MODEL", "/tmp/override.bin");
        std::env::set_var("FIELDEMBED_LOG_LEVEL", "trace");
        std::env::set_var("FIELDEMBED_SEED", "7");

        config.apply_env_overrides().unwrap();

        assert_eq!(config.model.path, "/tmp/override.bin");
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.training.seed, 7);

        // Clean up
        std::env::remove_var("FIELDEMBED_MODEL");
        std::env::remove_var("FIELDEMBED_LOG_LEVEL");
        std::env::remove_var("FIELDEMBED_SEED");
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde("~/models/x.bin");
        assert!(expanded.ends_with("models/x.bin"));
        assert!(!expanded.starts_with("~"));
        assert_eq!(expand_tilde("/abs/x.bin"), PathBuf::from("/abs/x.bin"));
    }
}
