//! Fusion ranker: blends BM25 and dense-embedding signals into a single
//! ranking, per spec.md §4.5's twelve-step algorithm, grounded on
//! `examples/original_source/backend/app/src/table_main.py`'s `retrieve`
//! and the teacher's `retrieval/src/vector_db.rs` candidate-pool pattern.
//!
//! This module only applies the first half of the answerability gate (the
//! fused-score threshold, §4.6); the coverage gate runs in the orchestrator
//! after this returns, since it needs the caller's own prompt-vs-snippet
//! framing rather than anything this ranker tracks internally.

use std::collections::HashSet;

use crate::retrieval::corpus::Corpus;
use crate::retrieval::vector_index::VectorIndex;
use crate::text::tokenize;

const MIN_MAX_EPSILON: f32 = 1e-9;
const TIE_BREAK_EPSILON: f32 = 1e-6;
const CANDIDATE_FLOOR: usize = 50;

pub struct FusionParams {
    pub k: usize,
    pub bm25_top_mult: usize,
    pub w_bm25: f32,
    pub w_embed: f32,
    pub answer_threshold: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        FusionParams {
            k: 5,
            bm25_top_mult: 5,
            w_bm25: 0.5,
            w_embed: 0.5,
            answer_threshold: 0.15,
        }
    }
}

/// Outcome of a fusion retrieval: the selected snippet ids (in ranked
/// order), their texts, and the best fused/Jaccard score observed. An empty
/// `ids` means either an empty corpus or a refusal at the fused-score gate.
pub struct FusionResult {
    pub ids: Vec<usize>,
    pub texts: Vec<String>,
    pub best_score: f32,
}

/// `retrieve(query, corpus, index, query_embedding, params) → FusionResult`.
///
/// `index` and `query_embedding` are both optional: either may be absent
/// (no index built yet, or no embedding client configured), in which case
/// the dense half of the fusion degrades to using Jaccard overlap as the
/// similarity term, per step 6 of the algorithm. When present, this reads
/// candidate embeddings directly from `index`'s stored rows (which are
/// already aligned to corpus ids from ingestion) rather than re-encoding
/// candidate texts — an equivalent result that avoids a redundant encode.
pub fn retrieve(
    query: &str,
    corpus: &Corpus,
    index: Option<&VectorIndex>,
    query_embedding: Option<&[f32]>,
    params: &FusionParams,
) -> FusionResult {
    if corpus.is_empty() {
        return FusionResult {
            ids: Vec::new(),
            texts: Vec::new(),
            best_score: 0.0,
        };
    }

    let n = corpus.len();
    let topn = (params.k * params.bm25_top_mult).max(n.min(CANDIDATE_FLOOR));

    let bm25_scores = corpus.bm25.score(query);
    let bm25_idx = top_n_indices(&bm25_scores, topn);

    let faiss_idx = match (index, query_embedding) {
        (Some(idx), Some(q_emb)) if !idx.is_empty() => {
            idx.search(q_emb, topn).into_iter().map(|(i, _)| i).collect()
        }
        _ => Vec::new(),
    };

    let candidates = unique_preserving_order(&bm25_idx, &faiss_idx);
    if candidates.is_empty() {
        return FusionResult {
            ids: Vec::new(),
            texts: Vec::new(),
            best_score: 0.0,
        };
    }

    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
    let jaccard: Vec<f32> = candidates
        .iter()
        .map(|&id| {
            let doc_tokens: HashSet<String> = tokenize(corpus.text(id).unwrap_or("")).into_iter().collect();
            jaccard_overlap(&query_tokens, &doc_tokens)
        })
        .collect();

    let similarity: Vec<f32> = match (index, query_embedding) {
        (Some(idx), Some(q_emb)) => candidates
            .iter()
            .map(|&id| idx.cosine_similarity(id, q_emb))
            .collect(),
        _ => jaccard.clone(),
    };

    let candidate_bm25: Vec<f32> = candidates.iter().map(|&id| bm25_scores[id]).collect();
    let norm_bm25 = min_max_normalize(&candidate_bm25);
    let norm_sim = min_max_normalize(&similarity);

    let mut combined: Vec<f32> = norm_bm25
        .iter()
        .zip(norm_sim.iter())
        .map(|(&b, &s)| params.w_bm25 * b + params.w_embed * s)
        .collect();

    if spread(&combined) < TIE_BREAK_EPSILON {
        combined = min_max_normalize(&jaccard);
    }

    let mut ranked: Vec<usize> = (0..candidates.len()).collect();
    ranked.sort_by(|&a, &b| {
        combined[b]
            .partial_cmp(&combined[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let best_score = combined
        .iter()
        .cloned()
        .fold(0.0f32, f32::max)
        .max(jaccard.iter().cloned().fold(0.0f32, f32::max));

    if best_score < params.answer_threshold {
        return FusionResult {
            ids: Vec::new(),
            texts: Vec::new(),
            best_score,
        };
    }

    let selected: Vec<usize> = ranked
        .into_iter()
        .take(params.k)
        .map(|pos| candidates[pos])
        .collect();
    let texts = selected
        .iter()
        .map(|&id| corpus.text(id).unwrap_or("").to_string())
        .collect();

    FusionResult {
        ids: selected,
        texts,
        best_score,
    }
}

fn top_n_indices(scores: &[f32], n: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..scores.len()).collect();
    idx.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    idx.truncate(n);
    idx
}

fn unique_preserving_order(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for &id in a.iter().chain(b.iter()) {
        if seen.insert(id) {
            out.push(id);
        }
    }
    out
}

fn jaccard_overlap(q: &HashSet<String>, d: &HashSet<String>) -> f32 {
    let union = q.union(d).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = q.intersection(d).count();
    intersection as f32 / union as f32
}

/// Min-max normalize over the given slice; if the spread collapses below
/// `1e-9`, every element becomes `0.5` (spec.md §4.5 step 7).
fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if max - min < MIN_MAX_EPSILON {
        return vec![0.5; values.len()];
    }
    values.iter().map(|&v| (v - min) / (max - min)).collect()
}

fn spread(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::corpus::build_corpus;
    use crate::workbook::SheetData;

    fn sample_corpus() -> Corpus {
        let sheet = SheetData {
            name: "Sales".to_string(),
            columns: vec!["Product".to_string(), "Revenue".to_string()],
            rows: vec![
                vec!["Apple".to_string(), "100".to_string()],
                vec!["Banana".to_string(), "50".to_string()],
                vec!["Weather".to_string(), "sunny".to_string()],
            ],
        };
        build_corpus(&[sheet])
    }

    #[test]
    fn empty_corpus_returns_empty_result() {
        let corpus = build_corpus(&[]);
        let result = retrieve("revenue", &corpus, None, None, &FusionParams::default());
        assert!(result.ids.is_empty());
        assert_eq!(result.best_score, 0.0);
    }

    #[test]
    fn bm25_only_path_ranks_matching_snippet_first() {
        let corpus = sample_corpus();
        let params = FusionParams {
            answer_threshold: 0.0,
            ..FusionParams::default()
        };
        let result = retrieve("apple revenue", &corpus, None, None, &params);
        assert!(!result.ids.is_empty());
        assert!(result.texts[0].contains("Apple"));
    }

    #[test]
    fn below_answer_threshold_refuses() {
        let corpus = sample_corpus();
        let params = FusionParams {
            answer_threshold: 10.0,
            ..FusionParams::default()
        };
        let result = retrieve("apple revenue", &corpus, None, None, &params);
        assert!(result.ids.is_empty());
        assert!(result.texts.is_empty());
    }

    #[test]
    fn min_max_normalize_collapses_to_half_when_flat() {
        let values = vec![3.0, 3.0, 3.0];
        let normed = min_max_normalize(&values);
        assert!(normed.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn jaccard_of_empty_union_is_one() {
        let a = HashSet::new();
        let b = HashSet::new();
        assert_eq!(jaccard_overlap(&a, &b), 1.0);
    }
}
