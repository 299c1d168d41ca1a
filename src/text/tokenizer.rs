//! Unicode normalization and tokenization, grounded on the original system's
//! `_tokenize` (`examples/original_source/backend/app/src/retrieval.py`):
//! NFKC-normalize, casefold, split on non letter/digit/underscore runs, drop
//! stopwords and pure numerics, then stem with an English Snowball stemmer.

use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

use super::stopwords::stopwords;

fn stemmer() -> &'static Stemmer {
    static STEMMER: std::sync::OnceLock<Stemmer> = std::sync::OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// `tokenize(text) → ordered list of tokens`, per spec.md §4.1. Pure and
/// deterministic; empty input yields an empty list.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();

    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in normalized.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let stop = stopwords();
    let stemmer = stemmer();
    tokens
        .into_iter()
        .filter(|t| !stop.contains(t.as_str()))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit() || c.is_numeric()))
        .map(|t| stemmer.stem(&t).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_list() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn drops_stopwords_and_numerics() {
        let toks = tokenize("What is the revenue of A in 2023?");
        assert!(!toks.iter().any(|t| t == "the" || t == "is" || t == "what"));
        assert!(!toks.iter().any(|t| t == "2023"));
    }

    #[test]
    fn is_deterministic() {
        let a = tokenize("Revenue closing prices increased");
        let b = tokenize("Revenue closing prices increased");
        assert_eq!(a, b);
    }

    #[test]
    fn lowercases_before_splitting() {
        let toks = tokenize("REVENUE Revenue revenue");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0], toks[1]);
        assert_eq!(toks[1], toks[2]);
    }

    #[test]
    fn splits_on_punctuation_runs() {
        let toks = tokenize("revenue,profit;margin");
        assert_eq!(toks, vec!["revenu", "profit", "margin"]);
    }
}
