//! Field-name feature encoding.
//!
//! A field name becomes a fixed-length vector built from two histograms over
//! the [`CharVocabulary`]: single-character frequencies and bucketed bigram
//! frequencies. Both are normalised to sum to one, concatenated, then padded
//! or truncated to `input_dim`.

use super::vocab::CharVocabulary;

/// Only the first `MAX_NAME_CHARS` characters of the lowercased name are encoded.
pub const MAX_NAME_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    vocabulary: CharVocabulary,
    input_dim: usize,
}

impl FeatureEncoder {
    pub fn new(vocabulary: CharVocabulary, input_dim: usize) -> Self {
        Self {
            vocabulary,
            input_dim,
        }
    }

    pub fn vocabulary(&self) -> &CharVocabulary {
        &self.vocabulary
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Encode a field name. Never fails: unsupported characters are ignored
    /// and a name with no recognised characters yields an all-zero vector.
    pub fn encode(&self, field_name: &str) -> Vec<f32> {
        let v = self.vocabulary.len();
        let indices: Vec<Option<usize>> = field_name
            .to_lowercase()
            .chars()
            .take(MAX_NAME_CHARS)
            .map(|c| self.vocabulary.index_of(c))
            .collect();

        let mut chars = vec![0.0f32; v];
        for idx in indices.iter().flatten() {
            chars[*idx] += 1.0;
        }

        let mut bigrams = vec![0.0f32; v];
        for window in indices.windows(2) {
            if let [Some(a), Some(b)] = window {
                bigrams[(a + b) % v] += 1.0;
            }
        }

        normalize_histogram(&mut chars);
        normalize_histogram(&mut bigrams);

        let mut features = chars;
        features.extend_from_slice(&bigrams);
        features.resize(self.input_dim, 0.0);
        features
    }
}

fn normalize_histogram(hist: &mut [f32]) {
    let total: f32 = hist.iter().sum();
    if total > 0.0 {
        for x in hist.iter_mut() {
            *x /= total;
        }
    }
}
