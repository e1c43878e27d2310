mod schema;
mod vector;

pub use vector::{QueryHit, VectorStore};

#[cfg(test)]
pub(crate) use vector::test_support;

use crate::gemini::GeminiError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vector database error: {0}")]
    Database(#[from] lancedb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("course table schema mismatch: {0}")]
    Schema(String),

    #[error("stored metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error(
        "documents, metadatas and ids must have the same length (got {documents}, {metadatas}, {ids})"
    )]
    LengthMismatch {
        documents: usize,
        metadatas: usize,
        ids: usize,
    },

    #[error("expected {expected} embeddings, got {got}")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("embedding has {got} dimensions, the course table expects {expected}")]
    Dimension { expected: usize, got: usize },

    #[error("embedding failed: {0}")]
    Embedding(#[from] GeminiError),
}

/// Turns text into vectors for the course index.
/// Implemented by `GeminiEmbedder` for production; mock implementations used in tests.
pub trait Embedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, StoreError>;
}
