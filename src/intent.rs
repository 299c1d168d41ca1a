//! Intent classification and prompt construction, grounded verbatim on
//! `table_main.py`'s `_detect_intent`/`_build_prompt` (spec.md §4.8).
//! First-match cascade over seven tags; drives which bullet "tail" gets
//! appended to the detailed prompt template.

/// The seven intent tags, in cascade-priority order. `Summary` is the
/// fallback when nothing else matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Compare,
    Trend,
    Superlative,
    Calc,
    Lookup,
    Explain,
    Summary,
}

const COMPARE_KEYWORDS: &[&str] = &[
    "compare",
    "versus",
    " vs ",
    "greater than",
    "less than",
    "higher than",
    "lower than",
];
const TREND_KEYWORDS: &[&str] = &[
    "trend",
    "evolution",
    "growth",
    "decline",
    "increase",
    "decrease",
    "over time",
];
const SUPERLATIVE_KEYWORDS: &[&str] = &[
    "highest", "lowest", "max", "min", "top", "least", "maximum", "minimum",
];
const CALC_KEYWORDS: &[&str] = &[
    "sum",
    "average",
    "avg",
    "mean",
    "median",
    "total",
    "variance",
    "std",
    "standard deviation",
    "count",
];
const LOOKUP_KEYWORDS: &[&str] = &["what is", "value of", "lookup", "find", "return", "show"];
const EXPLAIN_KEYWORDS: &[&str] = &["why", "explain", "reason"];

/// `classify(prompt) → Intent`, a case-insensitive substring cascade
/// matching the original's priority order: compare, trend, superlative,
/// calc, lookup, explain, then summary by default.
pub fn classify(prompt: &str) -> Intent {
    let p = prompt.to_lowercase();
    if COMPARE_KEYWORDS.iter().any(|k| p.contains(k)) {
        Intent::Compare
    } else if TREND_KEYWORDS.iter().any(|k| p.contains(k)) {
        Intent::Trend
    } else if SUPERLATIVE_KEYWORDS.iter().any(|k| p.contains(k)) {
        Intent::Superlative
    } else if CALC_KEYWORDS.iter().any(|k| p.contains(k)) {
        Intent::Calc
    } else if LOOKUP_KEYWORDS.iter().any(|k| p.contains(k)) {
        Intent::Lookup
    } else if EXPLAIN_KEYWORDS.iter().any(|k| p.contains(k)) {
        Intent::Explain
    } else {
        Intent::Summary
    }
}

const TAXONOMY: &str = "Operation taxonomy: aggregation (sum/avg/count), comparison (between entities), \
superlative (max/min/top), lookup (retrieve an exact value), trend (time-evolution), explain (reasons).";

fn tail(intent: Intent) -> &'static str {
    match intent {
        Intent::Trend => {
            "Provide a detailed trend analysis focused on:\n\
             - Direction and magnitude of changes over time\n\
             - Notable inflection points or anomalies (with dates)\n\
             - Brief reasoning grounded in the data\n\nAnswer:"
        }
        Intent::Compare => {
            "Provide a detailed comparison that includes:\n\
             - A short comparison of key metrics for each entity\n\
             - The winner/better option per metric with a one-line rationale\n\
             - Any caveats or missing data\n\nAnswer:"
        }
        Intent::Superlative => {
            "Provide a superlative-focused answer:\n\
             - Identify the candidate rows\n\
             - State the criterion and the max/min value with the entity/date\n\
             - Show a single supporting line with values\n\nAnswer:"
        }
        Intent::Calc => {
            "Provide a calculation-oriented answer:\n\
             - State the formula and variables used\n\
             - Show minimal steps (1-3) with referenced values\n\
             - Give the final numeric result with units/format\n\nAnswer:"
        }
        Intent::Lookup => {
            "Provide a precise fact-based answer:\n\
             - Identify the exact row(s)/cell(s) used\n\
             - Return the value(s) clearly\n\nAnswer:"
        }
        Intent::Explain => {
            "Provide a brief explanation grounded in data:\n\
             - List 2-3 possible reasons supported by the table\n\
             - Note uncertainties or missing fields if any\n\nAnswer:"
        }
        Intent::Summary => {
            "Provide a detailed yet focused answer:\n\
             - Key insights (bullet points)\n\
             - Any anomalies or outliers\n\
             - Short conclusion\n\nAnswer:"
        }
    }
}

/// Build the final generator prompt from selected snippets, the raw
/// question, and the detailed/concise flag, per spec.md §4.8.
///
/// Concise mode is a fixed three-part template. Detailed mode adds a
/// preamble, the operation taxonomy sentence, and an intent-specific tail
/// chosen by [`classify`].
pub fn build_prompt(selected: &[String], prompt: &str, detailed: bool, word_limit: u32) -> String {
    let context = selected.join("\n\n");

    if !detailed {
        return format!(
            "You are a helpful assistant. Use the following table snippets to answer the question concisely.\n\n{context}\n\nQuestion: {prompt}\nAnswer:"
        );
    }

    let intent = classify(prompt);
    let base = [
        "You are a helpful financial table assistant.".to_string(),
        "Use only the provided table snippets as evidence.".to_string(),
        "If evidence is insufficient, reply with 'Insufficient evidence' and request a more specific query."
            .to_string(),
        "Cite or reference the most relevant rows when helpful.".to_string(),
        "Be accurate and avoid unsupported assumptions.".to_string(),
        format!("Keep the final answer under approximately {word_limit} words while remaining clear."),
        TAXONOMY.to_string(),
        String::new(),
        context,
        String::new(),
        format!("Question: {prompt}"),
        String::new(),
        "First, implicitly decide the operation type from the taxonomy (no need to print it). Then answer accordingly."
            .to_string(),
        String::new(),
    ];

    format!("{}{}", base.join("\n"), tail(intent))
}
