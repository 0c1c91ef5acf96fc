//! Types shared by the ingestion pipeline.

use crate::{embedding::EmbeddingClientError, qdrant::QdrantError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The source folder could not be listed.
    #[error("Failed to list documents: {0}")]
    Walk(#[from] walkdir::Error),
    /// A document could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A file with a `.pdf` name could not be parsed as a PDF.
    #[error("Failed to extract text from {path}: {source}")]
    Pdf {
        /// File that failed to parse.
        path: PathBuf,
        /// Error raised by the PDF parser.
        #[source]
        source: lopdf::Error,
    },
    /// Text extraction task panicked or was cancelled.
    #[error("Text extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant rejected a collection or upsert request.
    #[error("Failed to store documents: {0}")]
    Store(#[from] QdrantError),
}

/// Plain text extracted from one PDF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name within the source folder.
    pub file_name: String,
    /// Concatenated text of every page.
    pub text: String,
}

/// Outcome of a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Collection the documents were appended to.
    pub collection: String,
    /// Number of points written.
    pub documents_indexed: usize,
}
