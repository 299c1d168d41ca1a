//! Property-based tests for the testable invariants of spec.md §8, in the
//! style of `rank-retrieve`'s `tests/property_tests.rs`.

use proptest::prelude::*;
use tablerag::retrieval::bm25::Bm25Stats;
use tablerag::retrieval::corpus::build_corpus;
use tablerag::retrieval::fusion::{retrieve, FusionParams};
use tablerag::workbook::SheetData;

fn word() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{2,8}").unwrap()
}

proptest! {
    #[test]
    fn bm25_score_length_always_matches_corpus(
        docs in prop::collection::vec(
            prop::collection::vec(word(), 0..15).prop_map(|ws| ws.join(" ")),
            0..30,
        ),
        query_words in prop::collection::vec(word(), 0..10),
    ) {
        let refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
        let stats = Bm25Stats::build(&refs);
        let query = query_words.join(" ");
        let scores = stats.score(&query);
        prop_assert_eq!(scores.len(), docs.len());
    }

    #[test]
    fn bm25_scores_are_never_negative(
        docs in prop::collection::vec(
            prop::collection::vec(word(), 0..15).prop_map(|ws| ws.join(" ")),
            1..20,
        ),
        query_words in prop::collection::vec(word(), 0..8),
    ) {
        let refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
        let stats = Bm25Stats::build(&refs);
        let query = query_words.join(" ");
        let scores = stats.score(&query);
        for s in scores {
            prop_assert!(s >= 0.0);
        }
    }

    #[test]
    fn retrieval_result_ids_bounded_and_texts_align(
        products in prop::collection::vec(word(), 1..25),
        k in 1usize..10,
    ) {
        let rows: Vec<Vec<String>> = products
            .iter()
            .enumerate()
            .map(|(i, p)| vec![p.clone(), i.to_string()])
            .collect();
        let sheet = SheetData {
            name: "Sheet".to_string(),
            columns: vec!["Product".to_string(), "Revenue".to_string()],
            rows,
        };
        let corpus = build_corpus(&[sheet]);
        let params = FusionParams {
            k,
            answer_threshold: 0.0,
            ..FusionParams::default()
        };
        let query = products.first().cloned().unwrap_or_default();
        let result = retrieve(&query, &corpus, None, None, &params);

        prop_assert_eq!(result.ids.len(), result.texts.len());
        prop_assert!(result.ids.len() <= k);
        for (id, text) in result.ids.iter().zip(result.texts.iter()) {
            prop_assert!(*id < corpus.len());
            prop_assert_eq!(corpus.text(*id).unwrap(), text.as_str());
        }
    }
}
