//! Embedding client contract (spec.md §4.3), grounded on the teacher's
//! `embedding/src/embeddings.rs::SentenceEmbedder`, generalized behind a
//! trait so the fusion ranker can be tested against a deterministic fake
//! and swapped to a remote encoder without touching ranking code.

use async_trait::async_trait;

use crate::error::AppError;

/// `encode_query(text) → vector of dimension d` and
/// `encode_batch(texts) → matrix of shape n × d`. Deterministic for a fixed
/// encoder. For the empty batch, returns a `0 × d` matrix using the
/// encoder's own declared dimension (spec.md §9 Open Questions: never a
/// hardcoded placeholder dimension).
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    fn dimension(&self) -> usize;

    async fn encode_query(&self, text: &str) -> Result<Vec<f32>, AppError>;

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError>;
}

/// Local sentence-embedding model via `rust-bert`, run on a blocking thread
/// since `SentenceEmbeddingsModel::encode` is a synchronous, CPU-bound call.
pub struct RustBertEmbedder {
    model: std::sync::Arc<tokio::sync::Mutex<rust_bert::pipelines::sentence_embeddings::SentenceEmbeddingsModel>>,
    dim: usize,
}

impl RustBertEmbedder {
    pub fn new() -> Result<Self, AppError> {
        use rust_bert::pipelines::sentence_embeddings::{
            SentenceEmbeddingsBuilder, SentenceEmbeddingsModelType,
        };

        let model = SentenceEmbeddingsBuilder::remote(SentenceEmbeddingsModelType::AllMiniLmL12V2)
            .create_model()
            .map_err(|e| AppError::UpstreamFailure(format!("loading sentence embedding model: {e}")))?;

        Ok(Self {
            model: std::sync::Arc::new(tokio::sync::Mutex::new(model)),
            dim: 384,
        })
    }
}

#[async_trait]
impl EmbeddingClient for RustBertEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn encode_query(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let vecs = self.encode_batch(&[text]).await?;
        vecs.into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("encoder returned no vector for query".into()))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model.clone();
        let owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        tokio::task::spawn_blocking(move || {
            let guard = model.blocking_lock();
            guard
                .encode(&owned)
                .map_err(|e| AppError::UpstreamFailure(format!("encoding batch: {e}")))
        })
        .await
        .map_err(|e| AppError::Internal(format!("embedding task panicked: {e}")))?
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;

    /// Deterministic hashing-based embedder for tests: maps each token to a
    /// fixed coordinate so cosine similarity reflects lexical overlap
    /// without pulling in a real model.
    pub struct FakeEmbedder {
        pub dim: usize,
    }

    #[async_trait]
    impl EmbeddingClient for FakeEmbedder {
        fn dimension(&self) -> usize {
            self.dim
        }

        async fn encode_query(&self, text: &str) -> Result<Vec<f32>, AppError> {
            Ok(self.embed_one(text))
        }

        async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
            Ok(texts.iter().map(|t| self.embed_one(t)).collect())
        }
    }

    impl FakeEmbedder {
        fn embed_one(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; self.dim];
            for tok in crate::text::tokenize(text) {
                let mut hash: u64 = 1469598103934665603;
                for b in tok.bytes() {
                    hash ^= b as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
                v[(hash as usize) % self.dim] += 1.0;
            }
            v
        }
    }
}
