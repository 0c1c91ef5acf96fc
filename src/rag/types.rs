//! Error and health types for the query service.

use crate::{completion::ChatClientError, embedding::EmbeddingClientError, qdrant::QdrantError};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced while answering a query.
#[derive(Debug, Error)]
pub enum RagError {
    /// The query could not be embedded.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant rejected the similarity search or collection check.
    #[error("Failed to retrieve documents: {0}")]
    Retrieval(#[from] QdrantError),
    /// The chat model failed to produce an answer.
    #[error("Failed to generate answer: {0}")]
    Completion(#[from] ChatClientError),
}

/// Reachability and readiness snapshot for Qdrant.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Whether Qdrant answered the collection listing.
    pub reachable: bool,
    /// Whether the configured collection is currently present.
    pub collection_present: bool,
    /// Diagnostic captured when Qdrant is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
