//! The two-stage answerability gate of spec.md §4.6: a fused-score threshold
//! (checked by the fusion ranker before this module runs) followed by a
//! query-term coverage gate, grounded verbatim on `table_main.py`'s
//! `_norm_tok`/`_tokens`/coverage loop. This coverage normalization is
//! deliberately distinct from [`crate::text::tokenize`] — it is a
//! hand-rolled suffix strip, not a Snowball stemmer, and a different
//! stopword/length filter, matching the original's lighter-weight gate.

use std::collections::HashSet;

const STOP: &[&str] = &[
    "the", "a", "an", "is", "are", "to", "of", "and", "in", "on", "for", "by", "with", "at",
    "from", "as", "it", "this", "that", "be", "or", "what", "which", "who", "whom", "whose",
    "when", "where", "why", "how",
];

const SUFFIXES: &[&str] = &["ing", "ed", "es", "s"];

/// Lowercase, strip a trailing suffix (first match of `ing`, `ed`, `es`, `s`
/// wins, only applied when the untouched token is longer than 4 chars),
/// then fold through a small synonym map.
fn norm_tok(t: &str) -> String {
    let mut t = t.to_lowercase();
    if t.len() > 4 {
        for suf in SUFFIXES {
            if t.ends_with(suf) {
                t.truncate(t.len() - suf.len());
                break;
            }
        }
    }
    match t.as_str() {
        "closing" => "close".to_string(),
        "closed" => "close".to_string(),
        "prices" => "price".to_string(),
        _ => t,
    }
}

/// Split on non-word-character runs, drop tokens of length ≤ 2 and
/// stopwords, then normalize each survivor.
fn coverage_tokens(s: &str) -> Vec<String> {
    let lower = s.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in lower.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
        .into_iter()
        .filter(|t| t.len() > 2 && !STOP.contains(&t.as_str()))
        .map(|t| norm_tok(&t))
        .collect()
}

/// Fraction of distinct query terms matched, exactly or by a ≥4-char
/// prefix relation, in a candidate snippet's token set. `0.0` whenever
/// either side is empty.
fn coverage(query_terms: &HashSet<String>, snippet_terms: &HashSet<String>) -> f32 {
    if query_terms.is_empty() || snippet_terms.is_empty() {
        return 0.0;
    }
    let mut matched = 0usize;
    for qt in query_terms {
        if snippet_terms.contains(qt) {
            matched += 1;
            continue;
        }
        let prefix_hit = snippet_terms.iter().any(|tt| {
            (qt.starts_with(tt.as_str()) || tt.starts_with(qt.as_str()))
                && qt.len() >= 4
                && tt.len() >= 4
        });
        if prefix_hit {
            matched += 1;
        }
    }
    matched as f32 / query_terms.len() as f32
}

/// `max_coverage(prompt, selected_snippets) → the best coverage ratio any
/// single selected snippet achieves against the prompt's query terms`.
/// Used by the pipeline to decide whether a fused-score-passing retrieval
/// still carries enough lexical evidence to answer (spec.md §4.6 stage two).
pub fn max_coverage(prompt: &str, selected_snippets: &[&str]) -> f32 {
    let query_terms: HashSet<String> = coverage_tokens(prompt).into_iter().collect();
    let mut best = 0.0f32;
    for snippet in selected_snippets {
        let snippet_terms: HashSet<String> = coverage_tokens(snippet).into_iter().collect();
        let cov = coverage(&query_terms, &snippet_terms);
        if cov > best {
            best = cov;
        }
    }
    best
}

/// Stage-two gate: does the best coverage among selected snippets clear the
/// configured threshold? (Stage one, the fused-score threshold, is applied
/// by [`crate::retrieval::fusion`] before this is ever called.)
pub fn passes_coverage_gate(prompt: &str, selected_snippets: &[&str], threshold: f32) -> bool {
    max_coverage(prompt, selected_snippets) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_term_match_gives_full_coverage() {
        let cov = max_coverage("revenue", &["revenue grew this quarter"]);
        assert!((cov - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unrelated_snippet_gives_zero_coverage() {
        let cov = max_coverage("revenue forecast", &["unrelated weather report today"]);
        assert_eq!(cov, 0.0);
    }

    #[test]
    fn synonym_closing_matches_close() {
        let cov = max_coverage("closing price", &["close price: 42"]);
        assert!(cov > 0.0);
    }

    #[test]
    fn prefix_match_requires_four_chars_both_sides() {
        let cov = max_coverage("closing", &["closed yesterday"]);
        assert!(cov > 0.0);
    }

    #[test]
    fn empty_prompt_yields_zero_coverage() {
        assert_eq!(max_coverage("", &["revenue grew"]), 0.0);
    }

    #[test]
    fn best_snippet_wins_across_candidates() {
        let cov = max_coverage(
            "apple revenue",
            &["unrelated text here", "apple revenue increased"],
        );
        assert!((cov - 1.0).abs() < 1e-6);
    }

    #[test]
    fn passes_gate_respects_threshold() {
        assert!(passes_coverage_gate("revenue", &["revenue up"], 0.15));
        assert!(!passes_coverage_gate("revenue forecast outlook", &["weather"], 0.15));
    }
}
