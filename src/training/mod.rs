//! Contrastive pairwise training.
//!
//! Similar pairs are pulled together with a squared-distance loss; dissimilar
//! pairs are pushed apart until their distance reaches the margin. Each epoch
//! visits every similar pair, then every dissimilar pair, in the order given.

pub mod corpus;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::network::NORM_EPSILON;
use crate::embedding::{l2_distance, EmbeddingNetwork, Gradients};
use crate::error::{Error, Result};

pub use corpus::PairSet;

/// Embeddings shorter than this are treated as collapsed: every ReLU on the
/// path is dead and normalisation has nothing left to scale.
const COLLAPSED_NORM: f32 = 0.5;

/// How gradients are applied within an epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    /// Update after every example: for each pair, backward on the first
    /// embedding, then backward on the second against the already-updated
    /// weights.
    #[default]
    Sequential,
    /// Forward every pair against the epoch-start weights, average the
    /// gradients of all contributing examples, and apply them once.
    Accumulated,
}

impl std::fmt::Display for TrainingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Accumulated => f.write_str("accumulated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    /// Minimum desired distance between dissimilar embeddings.
    pub margin: f32,
    /// Average loss is logged every `log_every` epochs.
    pub log_every: usize,
    pub mode: TrainingMode,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.01,
            margin: 1.0,
            log_every: 20,
            mode: TrainingMode::Sequential,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::invalid_config(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if !self.margin.is_finite() || self.margin <= 0.0 {
            return Err(Error::invalid_config(format!(
                "margin must be a positive number, got {}",
                self.margin
            )));
        }
        if self.log_every == 0 {
            return Err(Error::invalid_config("log_every must be at least 1"));
        }
        Ok(())
    }
}

/// Loss statistics for one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub epochs: usize,
    pub total_loss: f32,
    /// `total_loss` divided by the number of pairs (similar + dissimilar).
    pub average_loss: f32,
    /// Dissimilar pairs that were still inside the margin.
    pub active_dissimilar: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub epochs: usize,
    /// Average loss per epoch, in order.
    pub epoch_losses: Vec<f32>,
    /// Distinct training names.
    pub names: usize,
    /// Training names whose trained embedding is (near) zero.
    pub collapsed_names: usize,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f32> {
        self.epoch_losses.last().copied()
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed_names > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairKind {
    Similar,
    Dissimilar,
}

/// Loss and embedding gradients for one pair, or `None` when a dissimilar
/// pair is already at least `margin` apart.
fn pair_objective(
    kind: PairKind,
    emb1: &[f32],
    emb2: &[f32],
    margin: f32,
) -> Option<(f32, Vec<f32>, Vec<f32>)> {
    let diff: Vec<f32> = emb1.iter().zip(emb2).map(|(a, b)| a - b).collect();

    let (loss, factor) = match kind {
        PairKind::Similar => (diff.iter().map(|d| d * d).sum::<f32>(), 2.0),
        PairKind::Dissimilar => {
            let distance = diff.iter().map(|d| d * d).sum::<f32>().sqrt();
            if distance >= margin {
                return None;
            }
            let gap = margin - distance;
            (gap * gap, -2.0 * gap / (distance + NORM_EPSILON))
        }
    };

    let grad1: Vec<f32> = diff.iter().map(|d| factor * d).collect();
    let grad2: Vec<f32> = grad1.iter().map(|g| -g).collect();
    Some((loss, grad1, grad2))
}

/// Aggregate contrastive loss over a pair set, without touching the weights.
pub fn contrastive_loss<S: AsRef<str>>(
    network: &EmbeddingNetwork,
    similar: &[(S, S)],
    dissimilar: &[(S, S)],
    margin: f32,
) -> f32 {
    let tagged = similar
        .iter()
        .map(|p| (PairKind::Similar, p))
        .chain(dissimilar.iter().map(|p| (PairKind::Dissimilar, p)));

    tagged
        .filter_map(|(kind, (a, b))| {
            let e1 = network.embed(a.as_ref());
            let e2 = network.embed(b.as_ref());
            pair_objective(kind, &e1, &e2, margin).map(|(loss, _, _)| loss)
        })
        .sum()
}

/// Count the distinct names in both pair lists, and those among them whose
/// embedding has collapsed to (near) zero.
pub fn collapsed_names<S: AsRef<str>>(
    network: &EmbeddingNetwork,
    similar: &[(S, S)],
    dissimilar: &[(S, S)],
) -> (usize, usize) {
    let names: BTreeSet<&str> = similar
        .iter()
        .chain(dissimilar)
        .flat_map(|(a, b)| [a.as_ref(), b.as_ref()])
        .collect();
    let collapsed = names
        .iter()
        .filter(|name| {
            let norm = network.embed(name).iter().map(|v| v * v).sum::<f32>().sqrt();
            norm < COLLAPSED_NORM
        })
        .count();
    (names.len(), collapsed)
}

/// Mean embedding distance over a list of pairs; `0.0` for an empty list.
pub fn mean_pair_distance<S: AsRef<str>>(network: &EmbeddingNetwork, pairs: &[(S, S)]) -> f32 {
    if pairs.is_empty() {
        return 0.0;
    }
    let total: f32 = pairs
        .iter()
        .map(|(a, b)| l2_distance(&network.embed(a.as_ref()), &network.embed(b.as_ref())))
        .sum();
    total / pairs.len() as f32
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train `network` in place for exactly `epochs` epochs.
    pub fn train<S: AsRef<str>>(
        &self,
        network: &mut EmbeddingNetwork,
        similar: &[(S, S)],
        dissimilar: &[(S, S)],
    ) -> Result<TrainingReport> {
        self.train_with_progress(network, similar, dissimilar, |_| {})
    }

    /// Like [`Trainer::train`], calling `on_epoch` after every epoch.
    pub fn train_with_progress<S, F>(
        &self,
        network: &mut EmbeddingNetwork,
        similar: &[(S, S)],
        dissimilar: &[(S, S)],
        mut on_epoch: F,
    ) -> Result<TrainingReport>
    where
        S: AsRef<str>,
        F: FnMut(&EpochStats),
    {
        let cfg = &self.config;
        info!(
            similar = similar.len(),
            dissimilar = dissimilar.len(),
            epochs = cfg.epochs,
            learning_rate = cfg.learning_rate,
            margin = cfg.margin,
            mode = %cfg.mode,
            "training started"
        );

        let pair_count = similar.len() + dissimilar.len();
        let mut epoch_losses = Vec::with_capacity(cfg.epochs);

        for epoch in 1..=cfg.epochs {
            let (total_loss, active_dissimilar) = match cfg.mode {
                TrainingMode::Sequential => self.sequential_epoch(network, similar, dissimilar)?,
                TrainingMode::Accumulated => {
                    self.accumulated_epoch(network, similar, dissimilar)?
                }
            };

            let average_loss = if pair_count == 0 {
                0.0
            } else {
                total_loss / pair_count as f32
            };
            epoch_losses.push(average_loss);

            let stats = EpochStats {
                epoch,
                epochs: cfg.epochs,
                total_loss,
                average_loss,
                active_dissimilar,
            };
            debug!(epoch, loss = average_loss, active_dissimilar, "epoch finished");
            if epoch % cfg.log_every == 0 {
                info!(epoch, epochs = cfg.epochs, loss = average_loss, "training progress");
            }
            on_epoch(&stats);
        }

        network.set_trained(true);
        let (names, collapsed) = collapsed_names(network, similar, dissimilar);
        if collapsed > 0 {
            warn!(
                collapsed,
                names,
                learning_rate = cfg.learning_rate,
                "training collapsed: some names embed to a zero vector, try a lower learning rate"
            );
        }
        info!(epochs = cfg.epochs, "training completed");

        Ok(TrainingReport {
            epochs: cfg.epochs,
            epoch_losses,
            names,
            collapsed_names: collapsed,
        })
    }

    fn sequential_epoch<S: AsRef<str>>(
        &self,
        network: &mut EmbeddingNetwork,
        similar: &[(S, S)],
        dissimilar: &[(S, S)],
    ) -> Result<(f32, usize)> {
        let lr = self.config.learning_rate;
        let mut total_loss = 0.0f32;
        let mut active = 0usize;

        let tagged = similar
            .iter()
            .map(|p| (PairKind::Similar, p))
            .chain(dissimilar.iter().map(|p| (PairKind::Dissimilar, p)));

        for (kind, (a, b)) in tagged {
            let (emb1, cache1) = network.forward(&network.encode(a.as_ref()))?;
            let (emb2, cache2) = network.forward(&network.encode(b.as_ref()))?;

            let Some((loss, grad1, grad2)) = pair_objective(kind, &emb1, &emb2, self.config.margin)
            else {
                continue;
            };
            total_loss += loss;
            if kind == PairKind::Dissimilar {
                active += 1;
            }

            // The second update sees the weights left by the first.
            network.backward(&cache1, &grad1, lr)?;
            network.backward(&cache2, &grad2, lr)?;
        }

        Ok((total_loss, active))
    }

    fn accumulated_epoch<S: AsRef<str>>(
        &self,
        network: &mut EmbeddingNetwork,
        similar: &[(S, S)],
        dissimilar: &[(S, S)],
    ) -> Result<(f32, usize)> {
        let mut total_loss = 0.0f32;
        let mut active = 0usize;
        let mut grads = Gradients::zeros(network.config());
        let mut contributions = 0usize;

        let tagged = similar
            .iter()
            .map(|p| (PairKind::Similar, p))
            .chain(dissimilar.iter().map(|p| (PairKind::Dissimilar, p)));

        for (kind, (a, b)) in tagged {
            let (emb1, cache1) = network.forward(&network.encode(a.as_ref()))?;
            let (emb2, cache2) = network.forward(&network.encode(b.as_ref()))?;

            let Some((loss, grad1, grad2)) = pair_objective(kind, &emb1, &emb2, self.config.margin)
            else {
                continue;
            };
            total_loss += loss;
            if kind == PairKind::Dissimilar {
                active += 1;
            }

            grads.accumulate(&network.gradients(&cache1, &grad1)?);
            grads.accumulate(&network.gradients(&cache2, &grad2)?);
            contributions += 2;
        }

        if contributions > 0 {
            grads.scale(1.0 / contributions as f32);
            network.apply_gradients(&grads, self.config.learning_rate);
        }

        Ok((total_loss, active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{CharVocabulary, NetworkConfig};

    #[test]
    fn similar_objective_is_squared_distance() {
        let (loss, g1, g2) =
            pair_objective(PairKind::Similar, &[1.0, 0.0], &[0.0, 1.0], 1.0).unwrap();
        assert!((loss - 2.0).abs() < 1e-6);
        assert_eq!(g1, vec![2.0, -2.0]);
        assert_eq!(g2, vec![-2.0, 2.0]);
    }

    #[test]
    fn dissimilar_outside_margin_is_skipped() {
        assert!(pair_objective(PairKind::Dissimilar, &[1.0, 0.0], &[0.0, 1.0], 1.0).is_none());
    }

    #[test]
    fn dissimilar_inside_margin_pushes_apart() {
        let (loss, g1, _) =
            pair_objective(PairKind::Dissimilar, &[0.5, 0.0], &[0.0, 0.0], 1.0).unwrap();
        assert!((loss - 0.25).abs() < 1e-6);
        // factor = -2 * 0.5 / 0.5 = -2, grad1 = -2 * diff points away from emb2.
        assert!((g1[0] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad_lr = TrainingConfig {
            learning_rate: 0.0,
            ..TrainingConfig::default()
        };
        let bad_margin = TrainingConfig {
            margin: f32::NAN,
            ..TrainingConfig::default()
        };
        let bad_log = TrainingConfig {
            log_every: 0,
            ..TrainingConfig::default()
        };
        assert!(Trainer::new(bad_lr).is_err());
        assert!(Trainer::new(bad_margin).is_err());
        assert!(Trainer::new(bad_log).is_err());
    }

    #[test]
    fn zero_epochs_still_marks_trained() {
        let mut net = EmbeddingNetwork::new(NetworkConfig::default(), 0).unwrap();
        let before = net.weights().clone();
        let trainer = Trainer::new(TrainingConfig {
            epochs: 0,
            ..TrainingConfig::default()
        })
        .unwrap();
        let report = trainer.train(&mut net, &[("a", "b")], &[]).unwrap();
        assert!(report.epoch_losses.is_empty());
        assert!(net.is_trained());
        assert_eq!(net.weights(), &before);
    }

    #[test]
    fn empty_pair_sets_report_zero_loss() {
        let mut net = EmbeddingNetwork::new(NetworkConfig::default(), 0).unwrap();
        let trainer = Trainer::new(TrainingConfig {
            epochs: 3,
            ..TrainingConfig::default()
        })
        .unwrap();
        let empty: [(&str, &str); 0] = [];
        let report = trainer.train(&mut net, &empty, &empty).unwrap();
        assert_eq!(report.epoch_losses, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn progress_callback_sees_every_epoch() {
        let mut net = EmbeddingNetwork::new(NetworkConfig::default(), 0).unwrap();
        let trainer = Trainer::new(TrainingConfig {
            epochs: 5,
            ..TrainingConfig::default()
        })
        .unwrap();
        let mut seen = Vec::new();
        trainer
            .train_with_progress(&mut net, &[("ssn", "SSN_ID")], &[("ssn", "price")], |s| {
                seen.push(s.epoch)
            })
            .unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn dead_network_is_reported_as_collapsed() {
        let config = NetworkConfig::default();
        let mut weights = EmbeddingNetwork::new(config, 3).unwrap().weights().clone();
        weights.w2.fill(0.0);
        weights.b2.fill(-1.0);
        let mut net =
            EmbeddingNetwork::from_parts(config, CharVocabulary::default(), weights, false)
                .unwrap();

        let trainer = Trainer::new(TrainingConfig {
            epochs: 2,
            ..TrainingConfig::default()
        })
        .unwrap();
        let report = trainer
            .train(&mut net, &[("ssn", "SSN_ID")], &[("ssn", "price"), ("dob", "price")])
            .unwrap();

        assert_eq!(report.names, 4);
        assert_eq!(report.collapsed_names, 4);
        assert!(report.is_collapsed());
    }

    #[test]
    fn healthy_network_is_not_collapsed() {
        let mut net = EmbeddingNetwork::new(NetworkConfig::default(), 3).unwrap();
        let trainer = Trainer::new(TrainingConfig {
            epochs: 2,
            ..TrainingConfig::default()
        })
        .unwrap();
        let report = trainer
            .train(&mut net, &[("ssn", "SSN_ID")], &[("ssn", "price")])
            .unwrap();
        assert_eq!(report.names, 3);
        assert!(!report.is_collapsed());
    }

    #[test]
    fn contrastive_loss_matches_first_epoch_total() {
        let net = EmbeddingNetwork::new(NetworkConfig::default(), 21).unwrap();
        let similar = [("first_name", "fname")];
        let loss = contrastive_loss(&net, &similar, &[], 1.0);

        let mut trained = net.clone();
        let trainer = Trainer::new(TrainingConfig {
            epochs: 1,
            ..TrainingConfig::default()
        })
        .unwrap();
        let empty: [(&str, &str); 0] = [];
        let report = trainer.train(&mut trained, &similar, &empty).unwrap();
        // A single similar pair: the epoch loss is computed before any update.
        assert!((report.epoch_losses[0] - loss).abs() < 1e-6);
    }
}
