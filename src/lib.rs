#![deny(missing_docs)]

//! Core library for the IT Genie retrieval-augmented assistant.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat completion client abstraction and adapters.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF ingestion pipeline.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Qdrant vector store integration.
pub mod qdrant;
/// Retrieval-augmented query service.
pub mod rag;
