//! Typed configuration, grounded on the teacher's use of `dotenv`/env vars
//! for `OPENAI_API_KEY`/`OPENAI_BASE_URL` and generalized to the full
//! config surface of spec.md §6, loaded via the `config` crate (TOML file
//! plus `TABLERAG_`-prefixed environment overrides, following the
//! twelve-factor layering seen across the other_examples manifests).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub bm25_top_mult: usize,
    pub weight_bm25: f32,
    pub weight_embed: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            bm25_top_mult: 5,
            weight_bm25: 0.5,
            weight_embed: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmParams {
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl Default for LlmParams {
    fn default() -> Self {
        LlmParams {
            max_tokens: 500,
            stop: Vec::new(),
        }
    }
}

fn default_detailed_llm_params() -> LlmParams {
    LlmParams {
        max_tokens: 900,
        stop: Vec::new(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub embedding_model: String,
    pub index_path: String,
    pub k: usize,
    pub retrieval: RetrievalConfig,
    pub answerability_threshold: f32,
    pub evidence_overlap_threshold: f32,
    pub detailed_word_limit: u32,
    pub llm_params: LlmParams,
    pub llm_params_detailed: LlmParams,
    pub log_jsonl: String,
    pub generator_model: String,
    pub bind_addr: String,
    pub packaged_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            embedding_model: "sentence-transformers/all-MiniLM-L12-v2".to_string(),
            index_path: "data/index.bin".to_string(),
            k: 5,
            retrieval: RetrievalConfig::default(),
            answerability_threshold: 0.15,
            evidence_overlap_threshold: 0.15,
            detailed_word_limit: 200,
            llm_params: LlmParams::default(),
            llm_params_detailed: default_detailed_llm_params(),
            log_jsonl: "data/interactions.jsonl".to_string(),
            generator_model: "gpt-4o-mini".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            packaged_mode: false,
        }
    }
}

impl AppConfig {
    /// Load from `config/default.toml` (if present) layered with any
    /// `TABLERAG_`-prefixed environment variables (e.g. `TABLERAG_K=8`,
    /// `TABLERAG_RETRIEVAL__WEIGHT_BM25=0.7`), falling back to
    /// [`AppConfig::default`] when neither is set.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("TABLERAG").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.k, 5);
        assert_eq!(cfg.retrieval.bm25_top_mult, 5);
        assert_eq!(cfg.retrieval.weight_bm25, 0.5);
        assert_eq!(cfg.retrieval.weight_embed, 0.5);
        assert_eq!(cfg.answerability_threshold, 0.15);
        assert_eq!(cfg.evidence_overlap_threshold, 0.15);
        assert_eq!(cfg.detailed_word_limit, 200);
    }
}
