pub mod answerability;
pub mod bm25;
pub mod corpus;
pub mod embeddings;
pub mod fusion;
pub mod vector_index;

pub use corpus::{build_corpus, Corpus, Snippet};
pub use embeddings::EmbeddingClient;
pub use fusion::{FusionParams, FusionResult};
pub use vector_index::VectorIndex;
