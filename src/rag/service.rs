//! Query service: embed, retrieve, and answer.

use crate::{
    completion::{ChatClient, build_chat_client},
    config::Config,
    embedding::{EmbeddingClient, OpenAiEmbeddingClient, known_dimension},
    qdrant::QdrantService,
    rag::{
        prompt::build_messages,
        types::{HealthSnapshot, RagError},
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Abstraction over the answering pipeline used by the HTTP surface.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Answer a natural-language question from the stored documents.
    async fn answer(&self, query: &str) -> Result<String, RagError>;

    /// Probe the vector store backing the pipeline.
    async fn health(&self) -> HealthSnapshot;
}

/// Retrieval-augmented answering over the configured Qdrant collection.
///
/// Every call is a single pass: one query embedding, one similarity search, one chat
/// completion. Nothing is cached between calls.
pub struct RagService {
    config: Arc<Config>,
    embedding_client: Box<dyn EmbeddingClient>,
    chat_client: Box<dyn ChatClient>,
    qdrant_service: QdrantService,
}

impl RagService {
    /// Build the service with the configured embedding, chat, and Qdrant clients.
    pub fn new(config: Arc<Config>) -> Result<Self, RagError> {
        let embedding_client = OpenAiEmbeddingClient::new(&config)?;
        let chat_client = build_chat_client(&config)?;
        let qdrant_service = QdrantService::new(&config)?;
        Ok(Self::with_clients(
            config,
            Box::new(embedding_client),
            chat_client,
            qdrant_service,
        ))
    }

    /// Build the service around explicit clients.
    pub fn with_clients(
        config: Arc<Config>,
        embedding_client: Box<dyn EmbeddingClient>,
        chat_client: Box<dyn ChatClient>,
        qdrant_service: QdrantService,
    ) -> Self {
        Self {
            config,
            embedding_client,
            chat_client,
            qdrant_service,
        }
    }

    /// Build the service and make sure the configured collection exists.
    ///
    /// A missing collection is created with the embedding model's vector size when the model
    /// is known, otherwise with `Config::embedding_dimension`.
    pub async fn connect(config: Arc<Config>) -> Result<Self, RagError> {
        let service = Self::new(config)?;
        service.ensure_collection().await?;
        Ok(service)
    }

    /// Ensure the configured collection exists in Qdrant.
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        let collection = &self.config.qdrant_collection_name;
        let vector_size = self.collection_vector_size() as u64;
        tracing::debug!(collection = %collection, vector_size, "Ensuring collection");
        self.qdrant_service
            .create_collection_if_not_exists(collection, vector_size)
            .await?;
        tracing::info!(collection = %collection, "Collection ready");
        Ok(())
    }

    fn collection_vector_size(&self) -> usize {
        let configured = self.config.embedding_dimension;
        match known_dimension(&self.config.embedding_model) {
            Some(model_size) if model_size != configured => {
                tracing::warn!(
                    model = %self.config.embedding_model,
                    configured,
                    model_size,
                    "EMBEDDING_DIMENSION disagrees with the embedding model; using the model size"
                );
                model_size
            }
            _ => configured,
        }
    }

    /// Answer `query` using the most similar stored documents as context.
    ///
    /// The model output is returned exactly as produced.
    pub async fn answer(&self, query: &str) -> Result<String, RagError> {
        let collection = &self.config.qdrant_collection_name;
        let vector = self.embedding_client.embed_query(query).await?;

        let hits = self
            .qdrant_service
            .search_points(collection, vector, self.config.retrieval_top_k)
            .await?;
        tracing::debug!(collection = %collection, hits = hits.len(), "Retrieved documents");

        let answer = self.chat_client.complete(build_messages(query, &hits)).await?;
        tracing::info!(
            collection = %collection,
            documents = hits.len(),
            answer_chars = answer.len(),
            "Answered query"
        );
        Ok(answer)
    }

    /// Probe Qdrant and report whether the configured collection is present.
    pub async fn health(&self) -> HealthSnapshot {
        match self.qdrant_service.list_collections().await {
            Ok(collections) => HealthSnapshot {
                reachable: true,
                collection_present: collections
                    .iter()
                    .any(|name| name == &self.config.qdrant_collection_name),
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Qdrant health check failed");
                HealthSnapshot {
                    reachable: false,
                    collection_present: false,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl QueryApi for RagService {
    async fn answer(&self, query: &str) -> Result<String, RagError> {
        RagService::answer(self, query).await
    }

    async fn health(&self) -> HealthSnapshot {
        RagService::health(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn config_for(server: &MockServer) -> Arc<Config> {
        let base_url = server.base_url();
        let env: HashMap<&str, String> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test".to_string()),
            ("OPENAI_BASE_URL", base_url.clone()),
            ("QDRANT_URL", base_url),
            ("RETRIEVAL_TOP_K", "2".to_string()),
        ]);
        Arc::new(Config::from_lookup(|key| env.get(key).cloned()).expect("config"))
    }

    #[tokio::test]
    async fn answer_embeds_once_and_returns_completion_verbatim() {
        let server = MockServer::start_async().await;
        let query = "How do I reset my password?";

        let embeddings = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .json_body_partial(json!({ "input": [query] }).to_string());
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [0.25, 0.75] }]
                }));
            })
            .await;
        let search = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/it_docs/points/query")
                    .json_body_partial(json!({ "query": [0.25, 0.75], "limit": 2 }).to_string());
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": {
                        "points": [
                            {
                                "id": 7,
                                "score": 0.88,
                                "payload": { "page_content": "Open the self-service portal." }
                            }
                        ]
                    }
                }));
            })
            .await;
        let completion = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_contains("Open the self-service portal.")
                    .body_contains(query);
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": " Use the portal.\n" } }
                    ]
                }));
            })
            .await;

        let service = RagService::new(config_for(&server)).expect("service");
        let answer = service.answer(query).await.expect("answer");

        assert_eq!(answer, " Use the portal.\n");
        embeddings.assert_hits_async(1).await;
        search.assert_hits_async(1).await;
        completion.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn retrieval_failure_propagates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [0.1] }]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/it_docs/points/query");
                then.status(404).body("collection not found");
            })
            .await;
        let completion = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200);
            })
            .await;

        let service = RagService::new(config_for(&server)).expect("service");
        let error = service.answer("printer offline").await.unwrap_err();

        assert!(matches!(error, RagError::Retrieval(_)));
        completion.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn connect_creates_missing_collection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/it_docs");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/it_docs")
                    .json_body_partial(json!({ "vectors": { "size": 1536 } }).to_string());
                then.status(200).json_body(json!({ "status": "ok", "result": true }));
            })
            .await;

        RagService::connect(config_for(&server))
            .await
            .expect("connect");

        create.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn connect_sizes_collection_for_known_model() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/it_docs");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/it_docs")
                    .json_body_partial(json!({ "vectors": { "size": 3072 } }).to_string());
                then.status(200).json_body(json!({ "status": "ok", "result": true }));
            })
            .await;

        let base_url = server.base_url();
        let env: HashMap<&str, String> = HashMap::from([
            ("OPENAI_BASE_URL", base_url.clone()),
            ("QDRANT_URL", base_url),
            ("EMBEDDING_MODEL", "text-embedding-3-large".to_string()),
        ]);
        let config = Config::from_lookup(|key| env.get(key).cloned()).expect("config");
        assert_eq!(config.embedding_dimension, 1536);

        RagService::connect(Arc::new(config))
            .await
            .expect("connect");

        create.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn answer_uses_ollama_when_selected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [0.5, 0.5] }]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/it_docs/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": {
                        "points": [
                            { "id": 1, "score": 0.7, "payload": { "page_content": "Call the helpdesk." } }
                        ]
                    }
                }));
            })
            .await;
        let openai = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200);
            })
            .await;
        let ollama = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .body_contains("Call the helpdesk.");
                then.status(200).json_body(json!({
                    "model": "tinyllama",
                    "created_at": "2024-05-01T00:00:00Z",
                    "message": { "role": "assistant", "content": "Phone extension 4357." },
                    "done": true,
                    "total_duration": 10,
                    "load_duration": 1,
                    "prompt_eval_count": 12,
                    "prompt_eval_duration": 2,
                    "eval_count": 5,
                    "eval_duration": 3
                }));
            })
            .await;

        let base_url = server.base_url();
        let env: HashMap<&str, String> = HashMap::from([
            ("OPENAI_BASE_URL", base_url.clone()),
            ("QDRANT_URL", base_url.clone()),
            ("CHAT_PROVIDER", "ollama".to_string()),
            ("OLLAMA_URL", base_url),
        ]);
        let config = Config::from_lookup(|key| env.get(key).cloned()).expect("config");
        let service = RagService::new(Arc::new(config)).expect("service");
        let answer = service.answer("printer jammed").await.expect("answer");

        assert_eq!(answer, "Phone extension 4357.");
        ollama.assert_hits_async(1).await;
        openai.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn health_reports_collection_presence() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "collections": [{ "name": "it_docs" }, { "name": "other" }] }
                }));
            })
            .await;

        let service = RagService::new(config_for(&server)).expect("service");
        let snapshot = service.health().await;

        assert!(snapshot.reachable);
        assert!(snapshot.collection_present);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn health_reports_unreachable_qdrant() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections");
                then.status(503).body("starting up");
            })
            .await;

        let service = RagService::new(config_for(&server)).expect("service");
        let snapshot = service.health().await;

        assert!(!snapshot.reachable);
        assert!(!snapshot.collection_present);
        assert!(snapshot.error.is_some());
    }
}
