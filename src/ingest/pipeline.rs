//! Ingestion pipeline coordinating PDF loading, embedding, and Qdrant writes.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, OpenAiEmbeddingClient},
    ingest::{
        loader::load_texts_from_folder,
        types::{IngestError, IngestReport},
    },
    qdrant::{DocumentPoint, QdrantService},
};
use std::path::Path;
use std::sync::Arc;

/// Embeds every PDF of a folder and appends the results to the configured collection.
///
/// Each file becomes exactly one point. Nothing is deduplicated, so running the pipeline
/// twice over the same folder stores every document twice.
pub struct IngestionPipeline {
    config: Arc<Config>,
    embedding_client: Box<dyn EmbeddingClient>,
    qdrant_service: QdrantService,
}

impl IngestionPipeline {
    /// Build the pipeline with the OpenAI embedding client and Qdrant HTTP client.
    pub fn new(config: Arc<Config>) -> Result<Self, IngestError> {
        let embedding_client = OpenAiEmbeddingClient::new(&config)?;
        let qdrant_service = QdrantService::new(&config)?;
        Ok(Self::with_clients(
            config,
            Box::new(embedding_client),
            qdrant_service,
        ))
    }

    /// Build the pipeline around explicit clients.
    pub fn with_clients(
        config: Arc<Config>,
        embedding_client: Box<dyn EmbeddingClient>,
        qdrant_service: QdrantService,
    ) -> Self {
        Self {
            config,
            embedding_client,
            qdrant_service,
        }
    }

    /// Load, embed, and store every PDF directly inside `folder`.
    pub async fn ingest(&self, folder: &Path) -> Result<IngestReport, IngestError> {
        let collection = self.config.qdrant_collection_name.clone();
        tracing::info!(folder = %folder.display(), collection = %collection, "Starting ingestion");

        let documents = load_texts_from_folder(folder).await?;
        if documents.is_empty() {
            tracing::info!(folder = %folder.display(), "No PDF documents found");
            return Ok(IngestReport {
                collection,
                documents_indexed: 0,
            });
        }

        let texts: Vec<String> = documents.iter().map(|doc| doc.text.clone()).collect();
        let vectors = self.embedding_client.embed_documents(texts).await?;
        if vectors.len() != documents.len() {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {} embeddings, received {}",
                documents.len(),
                vectors.len()
            ))
            .into());
        }

        let vector_size = vectors.first().map_or(0, Vec::len) as u64;
        self.qdrant_service
            .create_collection_if_not_exists(&collection, vector_size)
            .await?;

        let points: Vec<DocumentPoint> = documents
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| DocumentPoint {
                text: document.text,
                source: document.file_name,
                vector,
            })
            .collect();

        let documents_indexed = self
            .qdrant_service
            .upsert_documents(&collection, points)
            .await?;

        tracing::info!(
            collection = %collection,
            documents = documents_indexed,
            "Documents embedded and stored"
        );

        Ok(IngestReport {
            collection,
            documents_indexed,
        })
    }
}
