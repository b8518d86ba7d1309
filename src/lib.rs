//! Neural field-name embeddings for matching data fields across naming
//! conventions.
//!
//! fieldembed maps short identifiers such as `firstName`, `FIRST_NAME` or
//! `social_security_number` to fixed-length unit vectors, so that names with
//! the same meaning land close together regardless of casing, abbreviation or
//! separator style. A small multilayer perceptron runs over character and
//! bigram histograms and is trained with a margin-based contrastive loss.
//!
//! | Signal | With model | Lexical fallback |
//! |--------|-----------:|-----------------:|
//! | Neural cosine, rescaled to `[0, 1]` | 0.8 | - |
//! | Normalised edit similarity | 0.1 | 0.3 |
//! | Character 2-4-gram TF-IDF cosine | - | 0.4 |
//! | Token overlap | 0.1 | 0.3 |
//!
//! # Architecture
//!
//! - **Features**: 40-symbol character histogram plus hashed bigram histogram
//! - **Network**: `input -> 128 -> ReLU -> 64 -> ReLU -> 32 -> L2 normalise`,
//!   with hand-written forward and backward passes over `ndarray`
//! - **Training**: plain SGD on similar / dissimilar pairs, sequential
//!   per-pair updates by default
//! - **Persistence**: versioned, checksummed binary artifact
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`embedding`]: Feature encoding and the embedding network
//! - [`training`]: Contrastive trainer and the builtin demographic corpus
//! - [`similarity`]: Blended similarity scoring, ranking and mapping suggestions
//! - [`store`]: Model artifact save / load

pub mod config;
pub mod embedding;
pub mod error;
pub mod similarity;
pub mod store;
pub mod training;

pub use embedding::{EmbeddingNetwork, FeatureEncoder, FieldEmbedder, NetworkConfig};
pub use error::{Error, Result};
pub use similarity::{FieldMatch, MappingReport, MatchType, SimilarityScorer};
pub use training::{PairSet, Trainer, TrainingConfig, TrainingMode, TrainingReport};
