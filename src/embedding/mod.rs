//! Field-name-to-vector embedding pipeline.
//!
//! [`FeatureEncoder`] turns a raw name into character and bigram histograms
//! over a [`CharVocabulary`]; [`EmbeddingNetwork`] maps those features to an
//! L2-normalised embedding. Both are deterministic for fixed weights.

pub mod encoder;
pub mod network;
pub mod vocab;

pub use encoder::FeatureEncoder;
pub use network::{EmbeddingNetwork, ForwardCache, Gradients, NetworkConfig, NetworkWeights};
pub use vocab::CharVocabulary;

/// Anything that embeds field names into fixed-length vectors.
///
/// Implementations produce vectors of exactly [`FieldEmbedder::dimensions`]
/// values, L2-normalised whenever the name contains a recognised character.
pub trait FieldEmbedder {
    fn embed(&self, field_name: &str) -> Vec<f32>;

    fn embed_batch(&self, field_names: &[&str]) -> Vec<Vec<f32>> {
        field_names.iter().map(|name| self.embed(name)).collect()
    }

    fn dimensions(&self) -> usize;
}

impl FieldEmbedder for EmbeddingNetwork {
    fn embed(&self, field_name: &str) -> Vec<f32> {
        EmbeddingNetwork::embed(self, field_name)
    }

    fn dimensions(&self) -> usize {
        self.config().embedding_dim
    }
}

/// Cosine similarity with an epsilon in the denominator; `0.0` for zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    dot / (norm_a * norm_b + network::NORM_EPSILON)
}

/// Euclidean distance between two equal-length vectors.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let v = [0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn l2_distance_345() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn trait_batch_matches_single() {
        let net = EmbeddingNetwork::new(NetworkConfig::default(), 4).unwrap();
        let embedder: &dyn FieldEmbedder = &net;
        let batch = embedder.embed_batch(&["ssn", "dob"]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("ssn"));
        assert_eq!(embedder.dimensions(), 32);
    }
}
