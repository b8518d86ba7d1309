//! Lexical similarity signals that need no trained model.
//!
//! All signals operate on [`normalize_field_name`] output, so `firstName`,
//! `first_name` and `FIRST-NAME` compare as the same string.

use std::collections::{HashMap, HashSet};

/// Character n-gram sizes used by [`ngram_cosine`].
const NGRAM_RANGE: std::ops::RangeInclusive<usize> = 2..=4;

/// Split camelCase boundaries, treat `_`, `-`, `.` and whitespace as
/// separators, lowercase, and join the resulting tokens with single spaces.
pub fn normalize_field_name(field_name: &str) -> String {
    let mut spaced = String::with_capacity(field_name.len() + 4);
    let mut prev: Option<char> = None;
    for c in field_name.chars() {
        if let Some(p) = prev {
            if p.is_lowercase() && c.is_uppercase() {
                spaced.push(' ');
            }
        }
        if matches!(c, '_' | '-' | '.') {
            spaced.push(' ');
        } else {
            spaced.push(c);
        }
        prev = Some(c);
    }

    spaced
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn tokens(normalized: &str) -> HashSet<&str> {
    normalized.split_whitespace().collect()
}

/// Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - levenshtein / max_len` over normalised names; `0.0` when both are empty.
pub fn edit_similarity(a: &str, b: &str) -> f32 {
    let a = normalize_field_name(a);
    let b = normalize_field_name(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein(&a, &b) as f32 / max_len as f32
}

/// Jaccard overlap of normalised token sets; `0.0` when both are empty.
pub fn token_overlap(a: &str, b: &str) -> f32 {
    let a = normalize_field_name(a);
    let b = normalize_field_name(b);
    let ta = tokens(&a);
    let tb = tokens(&b);
    let union = ta.union(&tb).count();
    if union == 0 {
        return 0.0;
    }
    ta.intersection(&tb).count() as f32 / union as f32
}

fn char_ngrams(s: &str) -> HashMap<String, f32> {
    let chars: Vec<char> = s.chars().collect();
    let mut counts = HashMap::new();
    for n in NGRAM_RANGE {
        for window in chars.windows(n) {
            *counts.entry(window.iter().collect::<String>()).or_insert(0.0) += 1.0;
        }
    }
    counts
}

/// TF-IDF weighted cosine of character 2–4-grams between two names.
///
/// IDF is smoothed over the two-document corpus: `ln(3 / (1 + df)) + 1`,
/// so shared n-grams weigh less than n-grams unique to one side.
pub fn ngram_cosine(a: &str, b: &str) -> f32 {
    let ga = char_ngrams(&normalize_field_name(a));
    let gb = char_ngrams(&normalize_field_name(b));
    if ga.is_empty() || gb.is_empty() {
        return 0.0;
    }

    let idf = |gram: &str| {
        let df = f32::from(u8::from(ga.contains_key(gram)) + u8::from(gb.contains_key(gram)));
        (3.0 / (1.0 + df)).ln() + 1.0
    };

    let weigh = |grams: &HashMap<String, f32>| -> HashMap<String, f32> {
        grams
            .iter()
            .map(|(g, tf)| (g.clone(), tf * idf(g)))
            .collect()
    };
    let wa = weigh(&ga);
    let wb = weigh(&gb);

    let dot: f32 = wa
        .iter()
        .filter_map(|(g, x)| wb.get(g).map(|y| x * y))
        .sum();
    let norm_a = wa.values().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = wb.values().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_conventions_to_one_form() {
        assert_eq!(normalize_field_name("firstName"), "first name");
        assert_eq!(normalize_field_name("first_name"), "first name");
        assert_eq!(normalize_field_name("FIRST_NAME"), "first name");
        assert_eq!(normalize_field_name("first-name.v2"), "first name v2");
        assert_eq!(normalize_field_name("  ssn__id "), "ssn id");
        assert_eq!(normalize_field_name(""), "");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn edit_similarity_range() {
        assert_eq!(edit_similarity("firstName", "first_name"), 1.0);
        assert_eq!(edit_similarity("", ""), 0.0);
        let s = edit_similarity("ssn", "social_security_number");
        assert!(s > 0.0 && s < 0.3, "{s}");
    }

    #[test]
    fn token_overlap_is_jaccard() {
        assert_eq!(token_overlap("emailAddress", "email"), 0.5);
        assert_eq!(token_overlap("firstName", "accountNumber"), 0.0);
        assert!((token_overlap("emailAddress", "email_addr") - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(token_overlap("", ""), 0.0);
    }

    #[test]
    fn ngram_cosine_orders_related_names() {
        let close = ngram_cosine("emailAddress", "emailAddr");
        let far = ngram_cosine("emailAddress", "phone");
        assert!(close > far, "close {close}, far {far}");
        assert!((ngram_cosine("zip_code", "zipCode") - 1.0).abs() < 1e-5);
        assert_eq!(ngram_cosine("a", "a"), 0.0);
    }
}
