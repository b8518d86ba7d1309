//! Bounded field-name similarity.
//!
//! The score is a fixed-weight blend of the neural embedding similarity and
//! lexical signals. Which blend applies is decided by whether a network is
//! loaded ([`SimilarityScorer::model_loaded`]):
//!
//! | Signal | With model ([`NEURAL_BLEND`]) | Without ([`LEXICAL_BLEND`]) |
//! |--------|------------------------------|-----------------------------|
//! | neural `(cos + 1) / 2` | 0.8 | - |
//! | edit similarity | 0.1 | 0.3 |
//! | char n-gram TF-IDF cosine | - | 0.4 |
//! | token overlap | 0.1 | 0.3 |
//!
//! Names equal under case-insensitive comparison always score `1.0`, and
//! every score is clamped into `[0, 1]`.

pub mod lexical;

use serde::Serialize;
use tracing::debug;

use crate::embedding::{cosine_similarity, EmbeddingNetwork};

/// Number of suggestions kept per target by [`SimilarityScorer::suggest_mappings`].
pub const SUGGESTIONS_PER_TARGET: usize = 5;

/// Weights of each signal in the final score. Weights sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlendWeights {
    pub neural: f32,
    pub edit: f32,
    pub ngram: f32,
    pub token: f32,
}

/// Neural-dominant blend used when a network is loaded.
pub const NEURAL_BLEND: BlendWeights = BlendWeights {
    neural: 0.8,
    edit: 0.1,
    ngram: 0.0,
    token: 0.1,
};

/// Lexical-only fallback used when no network is available.
pub const LEXICAL_BLEND: BlendWeights = BlendWeights {
    neural: 0.0,
    edit: 0.3,
    ngram: 0.4,
    token: 0.3,
};

/// Every signal behind one score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Names were equal ignoring case; no other signal was consulted.
    pub exact: bool,
    /// `(cos + 1) / 2` of the embeddings, when a network is loaded.
    pub neural: Option<f32>,
    pub edit: f32,
    pub ngram: f32,
    pub token: f32,
    pub weights: BlendWeights,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub field: String,
    pub similarity: f32,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSuggestions {
    pub target_field: String,
    pub suggestions: Vec<FieldMatch>,
    pub best_match: Option<FieldMatch>,
}

/// Suggested mappings from target fields to candidate fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingReport {
    pub total_fields: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub no_matches: usize,
    pub suggestions: Vec<TargetSuggestions>,
}

impl MappingReport {
    pub fn exact(&self) -> impl Iterator<Item = &TargetSuggestions> {
        self.suggestions.iter().filter(|s| {
            matches!(&s.best_match, Some(m) if m.match_type == MatchType::Exact)
        })
    }

    pub fn fuzzy(&self) -> impl Iterator<Item = &TargetSuggestions> {
        self.suggestions.iter().filter(|s| {
            matches!(&s.best_match, Some(m) if m.match_type == MatchType::Fuzzy)
        })
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &TargetSuggestions> {
        self.suggestions.iter().filter(|s| s.best_match.is_none())
    }
}

fn is_exact(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Scores field-name pairs with an optional embedding network.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    network: Option<EmbeddingNetwork>,
}

impl SimilarityScorer {
    pub fn new(network: EmbeddingNetwork) -> Self {
        Self {
            network: Some(network),
        }
    }

    /// Scorer with no network; uses [`LEXICAL_BLEND`].
    pub fn lexical_only() -> Self {
        Self { network: None }
    }

    pub fn from_optional(network: Option<EmbeddingNetwork>) -> Self {
        Self { network }
    }

    pub fn model_loaded(&self) -> bool {
        self.network.is_some()
    }

    pub fn network(&self) -> Option<&EmbeddingNetwork> {
        self.network.as_ref()
    }

    pub fn into_network(self) -> Option<EmbeddingNetwork> {
        self.network
    }

    pub fn weights(&self) -> BlendWeights {
        if self.model_loaded() {
            NEURAL_BLEND
        } else {
            LEXICAL_BLEND
        }
    }

    /// `(cos + 1) / 2` of the two embeddings, or `None` without a network.
    pub fn neural_similarity(&self, a: &str, b: &str) -> Option<f32> {
        let network = self.network.as_ref()?;
        let cos = cosine_similarity(&network.embed(a), &network.embed(b));
        Some((cos + 1.0) / 2.0)
    }

    /// Similarity in `[0, 1]`.
    pub fn similarity(&self, a: &str, b: &str) -> f32 {
        if is_exact(a, b) {
            return 1.0;
        }
        self.blend(a, b).score
    }

    pub fn score_breakdown(&self, a: &str, b: &str) -> ScoreBreakdown {
        if is_exact(a, b) {
            return ScoreBreakdown {
                exact: true,
                neural: None,
                edit: 1.0,
                ngram: 1.0,
                token: 1.0,
                weights: self.weights(),
                score: 1.0,
            };
        }
        self.blend(a, b)
    }

    fn blend(&self, a: &str, b: &str) -> ScoreBreakdown {
        let weights = self.weights();
        let neural = self.neural_similarity(a, b);
        let edit = lexical::edit_similarity(a, b);
        let ngram = if weights.ngram > 0.0 {
            lexical::ngram_cosine(a, b)
        } else {
            0.0
        };
        let token = lexical::token_overlap(a, b);

        let raw = weights.neural * neural.unwrap_or(0.0)
            + weights.edit * edit
            + weights.ngram * ngram
            + weights.token * token;

        ScoreBreakdown {
            exact: false,
            neural,
            edit,
            ngram,
            token,
            weights,
            score: raw.clamp(0.0, 1.0),
        }
    }

    /// Candidates scoring at least `threshold` against `target`, highest
    /// first, at most `top_n`. Equal scores keep their input order.
    pub fn find_similar<S: AsRef<str>>(
        &self,
        target: &str,
        candidates: &[S],
        threshold: f32,
        top_n: usize,
    ) -> Vec<FieldMatch> {
        let mut matches: Vec<FieldMatch> = candidates
            .iter()
            .filter_map(|candidate| {
                let candidate = candidate.as_ref();
                let similarity = self.similarity(target, candidate);
                (similarity >= threshold).then(|| FieldMatch {
                    field: candidate.to_string(),
                    similarity,
                    match_type: if similarity == 1.0 {
                        MatchType::Exact
                    } else {
                        MatchType::Fuzzy
                    },
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(top_n);
        matches
    }

    /// For each target, the top [`SUGGESTIONS_PER_TARGET`] candidates above
    /// `threshold`, its best match, and exact / fuzzy / unmatched counts.
    pub fn suggest_mappings<T: AsRef<str>, C: AsRef<str>>(
        &self,
        targets: &[T],
        candidates: &[C],
        threshold: f32,
    ) -> MappingReport {
        let suggestions: Vec<TargetSuggestions> = targets
            .iter()
            .map(|target| {
                let target = target.as_ref();
                let suggestions =
                    self.find_similar(target, candidates, threshold, SUGGESTIONS_PER_TARGET);
                TargetSuggestions {
                    target_field: target.to_string(),
                    best_match: suggestions.first().cloned(),
                    suggestions,
                }
            })
            .collect();

        let mut report = MappingReport {
            total_fields: targets.len(),
            exact_matches: 0,
            fuzzy_matches: 0,
            no_matches: 0,
            suggestions,
        };
        report.exact_matches = report.exact().count();
        report.fuzzy_matches = report.fuzzy().count();
        report.no_matches = report.unmatched().count();

        debug!(
            targets = report.total_fields,
            exact = report.exact_matches,
            fuzzy = report.fuzzy_matches,
            unmatched = report.no_matches,
            "mapping suggestions computed"
        );
        report
    }
}
