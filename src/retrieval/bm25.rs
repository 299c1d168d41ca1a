//! BM25 scoring, grounded on `examples/original_source/backend/app/src/retrieval.py::BM25`
//! and the teacher's `lexical/src/hybrid.rs::Bm25Index`, with the exact
//! IDF/summation formula of spec.md §4.2.

use std::collections::HashMap;

use crate::text::tokenize;

pub const K1: f32 = 1.5;
pub const B: f32 = 0.75;

const AVGDL_EPSILON: f32 = 1e-9;

/// Per-corpus inverted statistics needed to score any query against it.
#[derive(Debug, Clone)]
pub struct Bm25Stats {
    corpus_tokens: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    idf: HashMap<String, f32>,
    doc_len: Vec<usize>,
    avgdl: f32,
    n: usize,
}

impl Bm25Stats {
    /// `build(corpus) → stats`. `N` is the number of documents; document
    /// frequency counts each term once per document (set semantics).
    pub fn build(corpus: &[&str]) -> Self {
        let corpus_tokens: Vec<Vec<String>> = corpus.iter().map(|doc| tokenize(doc)).collect();
        let n = corpus.len();
        let doc_len: Vec<usize> = corpus_tokens.iter().map(|t| t.len()).collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in &corpus_tokens {
            let mut seen = std::collections::HashSet::new();
            for term in tokens {
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }

        let avgdl = if n > 0 {
            doc_len.iter().sum::<usize>() as f32 / n as f32
        } else {
            0.0
        };

        let idf = doc_freq
            .iter()
            .map(|(term, &df)| {
                let score = (1.0 + (n as f32 - df as f32 + 0.5) / (df as f32 + 0.5)).ln();
                (term.clone(), score)
            })
            .collect();

        Bm25Stats {
            corpus_tokens,
            doc_freq,
            idf,
            doc_len,
            avgdl,
            n,
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    /// `score(query, stats) → list of per-doc scores`, same length as the
    /// corpus. Empty query or empty corpus yields a vector of zeros. A
    /// document with no tokens scores 0 regardless of query.
    pub fn score(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.n];
        if self.n == 0 {
            return scores;
        }
        let q_tokens = tokenize(query);
        if q_tokens.is_empty() {
            return scores;
        }

        let mut q_counts: HashMap<&str, usize> = HashMap::new();
        for t in &q_tokens {
            *q_counts.entry(t.as_str()).or_insert(0) += 1;
        }

        for (i, doc_tokens) in self.corpus_tokens.iter().enumerate() {
            if doc_tokens.is_empty() {
                continue;
            }
            let mut freq: HashMap<&str, usize> = HashMap::new();
            for t in doc_tokens {
                *freq.entry(t.as_str()).or_insert(0) += 1;
            }
            let dl = self.doc_len[i] as f32;
            let denom = K1 * (1.0 - B + B * dl / (self.avgdl + AVGDL_EPSILON));

            let mut s = 0.0f32;
            for (&term, _qtf) in &q_counts {
                let Some(&f) = freq.get(term) else { continue };
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                let f = f as f32;
                s += idf * (f * (K1 + 1.0)) / (f + denom);
            }
            scores[i] = s;
        }
        scores
    }
}
