#![allow(dead_code)]

use std::sync::OnceLock;

use fieldembed::{
    EmbeddingNetwork, NetworkConfig, SimilarityScorer, Trainer, TrainingConfig, TrainingMode,
};

pub const SEED: u64 = 42;

/// Pairs that name the same field in different conventions.
pub const SIMILAR: &[(&str, &str)] = &[
    ("firstName", "first_name"),
    ("ssn", "social_security_number"),
    ("email", "emailAddress"),
    ("emailAddress", "emailAddr"),
    ("email", "email_address"),
    ("lastName", "last_name"),
    ("phone", "phoneNumber"),
    ("accountNumber", "account_number"),
];

/// Pairs that name unrelated fields.
pub const DISSIMILAR: &[(&str, &str)] = &[
    ("firstName", "accountNumber"),
    ("emailAddress", "phone"),
    ("ssn", "price"),
    ("firstName", "ssn"),
    ("email", "phone"),
    ("accountNumber", "emailAddress"),
    ("social_security_number", "firstName"),
    ("lastName", "accountNumber"),
    ("phoneNumber", "social_security_number"),
    ("first_name", "account_number"),
];

/// Sequential-mode settings that fit [`SIMILAR`] / [`DISSIMILAR`] well.
pub fn focused_training() -> TrainingConfig {
    TrainingConfig {
        epochs: 100,
        learning_rate: 0.05,
        margin: 1.0,
        log_every: 20,
        mode: TrainingMode::Sequential,
    }
}

/// Fresh He-initialised network with the default shape.
pub fn untrained() -> EmbeddingNetwork {
    EmbeddingNetwork::new(NetworkConfig::default(), SEED).unwrap()
}

/// Network trained once per test binary on the focused pair set.
pub fn trained_network() -> &'static EmbeddingNetwork {
    static NETWORK: OnceLock<EmbeddingNetwork> = OnceLock::new();
    NETWORK.get_or_init(|| {
        let mut network = untrained();
        Trainer::new(focused_training())
            .unwrap()
            .train(&mut network, SIMILAR, DISSIMILAR)
            .unwrap();
        network
    })
}

pub fn trained_scorer() -> SimilarityScorer {
    SimilarityScorer::new(trained_network().clone())
}

pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
