use std::collections::HashSet;

/// The fixed English stopword set from spec.md §4.1, plus question words.
pub fn stopwords() -> &'static HashSet<&'static str> {
    static WORDS: std::sync::OnceLock<HashSet<&'static str>> = std::sync::OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "the", "a", "an", "is", "are", "to", "of", "and", "in", "on", "for", "by", "with",
            "at", "from", "as", "it", "this", "that", "be", "or", "what", "which", "who", "whom",
            "whose", "when", "where", "why", "how",
        ]
        .into_iter()
        .collect()
    })
}
