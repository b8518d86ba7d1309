//! Character vocabulary used by the feature encoder.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// The compiled-in symbol set: lowercase letters, digits, `_`, `-`, `.` and space.
pub const DEFAULT_SYMBOLS: &str = "abcdefghijklmnopqrstuvwxyz0123456789_-. ";

/// Ordered mapping from symbol to a dense index `0..len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharVocabulary {
    symbols: Vec<char>,
    index: HashMap<char, usize>,
}

impl Default for CharVocabulary {
    fn default() -> Self {
        // DEFAULT_SYMBOLS has no duplicates.
        let symbols: Vec<char> = DEFAULT_SYMBOLS.chars().collect();
        let index = symbols.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { symbols, index }
    }
}

impl CharVocabulary {
    /// Build a vocabulary from an explicit symbol string. Symbols must be
    /// distinct and the set must not be empty.
    pub fn from_symbols(symbols: &str) -> Result<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(Error::invalid_config("vocabulary must contain at least one symbol"));
        }

        let mut index = HashMap::with_capacity(symbols.len());
        for (i, &c) in symbols.iter().enumerate() {
            if index.insert(c, i).is_some() {
                return Err(Error::invalid_config(format!(
                    "duplicate vocabulary symbol {c:?}"
                )));
            }
        }

        Ok(Self { symbols, index })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Index of `c`, or `None` when the character is not part of the vocabulary.
    #[inline]
    pub fn index_of(&self, c: char) -> Option<usize> {
        self.index.get(&c).copied()
    }

    /// The symbols in index order, as stored in model artifacts.
    pub fn symbols(&self) -> String {
        self.symbols.iter().collect()
    }
}
