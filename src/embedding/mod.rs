//! Embedding clients used for documents and queries.
//!
//! Inputs longer than the model context are split into token windows. Each window is
//! embedded, and the document vector is the token-weighted, normalized average of its windows.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::ops::Range;
use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model};

/// Maximum number of inputs sent in a single embeddings request.
const MAX_INPUTS_PER_REQUEST: usize = 1000;
/// Maximum number of tokens sent in a single embeddings request.
const MAX_TOKENS_PER_REQUEST: usize = 300_000;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or did not match the request.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Token encoding could not be loaded.
    #[error("Tokenizer unavailable: {0}")]
    Tokenizer(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one embedding per text, in input order.
    async fn embed_documents(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Produce the embedding of a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        self.embed_documents(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingClientError::InvalidResponse("no embedding returned".into()))
    }
}

/// Vector size produced by well-known OpenAI embedding models.
pub fn known_dimension(model: &str) -> Option<usize> {
    match model.trim() {
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Embedding client for the OpenAI `/embeddings` endpoint.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    tokenizer: CoreBPE,
    context_tokens: usize,
}

/// Slice of one input text sent as its own embedding input.
struct Window {
    owner: usize,
    text: String,
    tokens: usize,
}

impl OpenAiEmbeddingClient {
    /// Build a client from the shared configuration.
    pub fn new(config: &Config) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("itgenie/embeddings")
            .build()
            .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;
        let tokenizer = build_tokenizer(&config.embedding_model)?;
        tracing::debug!(
            model = %config.embedding_model,
            base_url = %config.openai_base_url,
            context_tokens = config.embedding_context_tokens,
            "Initialized embedding client"
        );
        Ok(Self {
            http,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.embedding_model.clone(),
            tokenizer,
            context_tokens: config.embedding_context_tokens.max(1),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    fn windows_for(&self, texts: &[String]) -> Vec<Window> {
        let mut windows = Vec::with_capacity(texts.len());
        for (owner, text) in texts.iter().enumerate() {
            let pieces = split_into_windows(&self.tokenizer, text, self.context_tokens);
            if pieces.len() > 1 {
                tracing::debug!(
                    input = owner,
                    windows = pieces.len(),
                    "Input exceeds embedding context; embedding in windows"
                );
            }
            windows.extend(
                pieces
                    .into_iter()
                    .map(|(text, tokens)| Window { owner, text, tokens }),
            );
        }
        windows
    }

    async fn request_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let payload = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|error| {
            EmbeddingClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                tracing::error!(%status, "Embedding provider rejected credentials");
            }
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode embeddings response: {error}"
            ))
        })?;

        order_embeddings(body.data, inputs.len())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed_documents(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let windows = self.windows_for(&texts);
        tracing::debug!(
            model = %self.model,
            count = texts.len(),
            windows = windows.len(),
            "Generating embeddings"
        );

        let token_counts: Vec<usize> = windows.iter().map(|window| window.tokens).collect();
        let mut embeddings = Vec::with_capacity(windows.len());
        for range in plan_batches(&token_counts, MAX_INPUTS_PER_REQUEST, MAX_TOKENS_PER_REQUEST) {
            let inputs: Vec<&str> = windows[range]
                .iter()
                .map(|window| window.text.as_str())
                .collect();
            embeddings.extend(self.request_batch(&inputs).await?);
        }

        combine_windows(texts.len(), &windows, embeddings)
    }
}

fn build_tokenizer(model: &str) -> Result<CoreBPE, EmbeddingClientError> {
    match get_bpe_from_model(model.trim()) {
        Ok(tokenizer) => Ok(tokenizer),
        Err(error) => {
            tracing::warn!(
                model,
                error = %error,
                "No tokenizer registered for embedding model; using cl100k_base"
            );
            cl100k_base().map_err(|error| EmbeddingClientError::Tokenizer(error.to_string()))
        }
    }
}

/// Split `text` into consecutive windows of at most `context_tokens` tokens.
///
/// Windows end on character boundaries, so their concatenation is the original text.
fn split_into_windows(
    tokenizer: &CoreBPE,
    text: &str,
    context_tokens: usize,
) -> Vec<(String, usize)> {
    let tokens = tokenizer.encode_ordinary(text);
    if tokens.len() <= context_tokens {
        return vec![(text.to_string(), tokens.len())];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let limit = (start + context_tokens).min(tokens.len());
        let (end, window) = (start + 1..=limit)
            .rev()
            .find_map(|end| {
                tokenizer
                    .decode(tokens[start..end].to_vec())
                    .ok()
                    .map(|window| (end, window))
            })
            .unwrap_or_else(|| {
                let rest = tokenizer
                    .decode(tokens[start..].to_vec())
                    .unwrap_or_default();
                (tokens.len(), rest)
            });
        windows.push((window, end - start));
        start = end;
    }
    windows
}

/// Group consecutive inputs into requests bounded by input count and total tokens.
fn plan_batches(token_counts: &[usize], max_inputs: usize, max_tokens: usize) -> Vec<Range<usize>> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut tokens = 0;
    for (index, count) in token_counts.iter().enumerate() {
        let full = index - start == max_inputs || (index > start && tokens + count > max_tokens);
        if full {
            batches.push(start..index);
            start = index;
            tokens = 0;
        }
        tokens += count;
    }
    if start < token_counts.len() {
        batches.push(start..token_counts.len());
    }
    batches
}

/// Fold window embeddings back into one vector per input text.
fn combine_windows(
    input_count: usize,
    windows: &[Window],
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if embeddings.len() != windows.len() {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {} embeddings, received {}",
            windows.len(),
            embeddings.len()
        )));
    }

    let mut grouped: Vec<Vec<(Vec<f32>, usize)>> = vec![Vec::new(); input_count];
    for (window, embedding) in windows.iter().zip(embeddings) {
        if let Some(parts) = grouped.get_mut(window.owner) {
            parts.push((embedding, window.tokens));
        }
    }

    grouped
        .into_iter()
        .enumerate()
        .map(|(index, mut parts)| {
            if parts.len() > 1 {
                return Ok(weighted_average(&parts));
            }
            parts.pop().map(|(vector, _)| vector).ok_or_else(|| {
                EmbeddingClientError::InvalidResponse(format!("missing embedding {index}"))
            })
        })
        .collect()
}

/// Token-weighted mean of window vectors, scaled to unit length.
fn weighted_average(parts: &[(Vec<f32>, usize)]) -> Vec<f32> {
    let dimension = parts.first().map_or(0, |(vector, _)| vector.len());
    let total: usize = parts.iter().map(|(_, tokens)| tokens).sum();
    let mut average = vec![0.0_f32; dimension];
    for (vector, tokens) in parts {
        let weight = if total == 0 {
            1.0 / parts.len() as f32
        } else {
            *tokens as f32 / total as f32
        };
        for (slot, value) in average.iter_mut().zip(vector) {
            *slot += value * weight;
        }
    }

    let norm = average.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut average {
            *value /= norm;
        }
    }
    average
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Place each returned vector at the position of the input it belongs to.
fn order_embeddings(
    data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if data.len() != expected {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} embeddings, received {}",
            data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            EmbeddingClientError::InvalidResponse(format!("index {} out of range", item.index))
        })?;
        *slot = Some(item.embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| {
                EmbeddingClientError::InvalidResponse(format!("missing embedding {index}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client_with_context(server: &MockServer, context_tokens: usize) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient {
            http: Client::builder()
                .user_agent("itgenie-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: Some("sk-test".into()),
            model: "text-embedding-ada-002".into(),
            tokenizer: cl100k_base().expect("tokenizer"),
            context_tokens,
        }
    }

    fn client_for(server: &MockServer) -> OpenAiEmbeddingClient {
        client_with_context(server, 8191)
    }

    #[tokio::test]
    async fn embeddings_are_returned_in_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(
                        json!({ "model": "text-embedding-ada-002", "input": ["first", "second"] })
                            .to_string(),
                    );
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [
                        { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                        { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let vectors = client_for(&server)
            .embed_documents(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_query_sends_a_single_input() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .json_body_partial(json!({ "input": ["reset vpn"] }).to_string());
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [0.5, 0.5] }]
                }));
            })
            .await;

        let vector = client_for(&server)
            .embed_query("reset vpn")
            .await
            .expect("embedding");

        mock.assert_hits_async(1).await;
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(401).body("invalid api key");
            })
            .await;

        let error = client_for(&server)
            .embed_documents(vec!["text".into()])
            .await
            .expect_err("error response");

        assert!(
            matches!(error, EmbeddingClientError::GenerationFailed(message) if message.contains("401"))
        );
    }

    #[tokio::test]
    async fn long_input_is_embedded_in_windows_and_averaged() {
        let server = MockServer::start_async().await;
        let client = client_with_context(&server, 8);
        let long_text = "Restart the VPN client after every security update. ".repeat(12);

        let windows = split_into_windows(&client.tokenizer, &long_text, 8);
        assert!(windows.len() > 1);
        assert!(windows.iter().all(|(_, tokens)| *tokens <= 8));
        let rejoined: String = windows.iter().map(|(text, _)| text.as_str()).collect();
        assert_eq!(rejoined, long_text);

        let mut expected_inputs = vec!["short note".to_string()];
        expected_inputs.extend(windows.iter().map(|(text, _)| text.clone()));
        let data: Vec<_> = (0..expected_inputs.len())
            .map(|index| json!({ "index": index, "embedding": [3.0, 4.0] }))
            .collect();

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .json_body_partial(json!({ "input": expected_inputs }).to_string());
                then.status(200).json_body(json!({ "data": data }));
            })
            .await;

        let vectors = client
            .embed_documents(vec!["short note".into(), long_text.clone()])
            .await
            .expect("embeddings");

        mock.assert_hits_async(1).await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![3.0, 4.0]);
        assert!((vectors[1][0] - 0.6).abs() < 1e-6);
        assert!((vectors[1][1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn short_text_stays_a_single_window() {
        let tokenizer = cl100k_base().expect("tokenizer");
        let windows = split_into_windows(&tokenizer, "reset my password", 8191);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].0, "reset my password");

        let empty = split_into_windows(&tokenizer, "", 8191);
        assert_eq!(empty, vec![(String::new(), 0)]);
    }

    #[test]
    fn windows_are_weighted_by_token_count() {
        let average = weighted_average(&[(vec![1.0, 0.0], 3), (vec![0.0, 1.0], 1)]);
        let norm = (0.75_f32 * 0.75 + 0.25 * 0.25).sqrt();
        assert!((average[0] - 0.75 / norm).abs() < 1e-6);
        assert!((average[1] - 0.25 / norm).abs() < 1e-6);
    }

    #[test]
    fn batches_respect_input_and_token_limits() {
        assert_eq!(plan_batches(&[5, 5, 5, 5], 3, 12), vec![0..2, 2..4]);
        assert_eq!(plan_batches(&[1, 1, 1, 1, 1], 2, 100), vec![0..2, 2..4, 4..5]);
        assert_eq!(plan_batches(&[20, 1], 10, 12), vec![0..1, 1..2]);
        assert!(plan_batches(&[], 10, 12).is_empty());
    }

    #[test]
    fn known_models_report_their_dimension() {
        assert_eq!(known_dimension("text-embedding-ada-002"), Some(1536));
        assert_eq!(known_dimension("text-embedding-3-large"), Some(3072));
        assert_eq!(known_dimension("nomic-embed-text"), None);
    }

    #[test]
    fn order_embeddings_rejects_count_mismatch() {
        let error = order_embeddings(
            vec![EmbeddingData {
                index: 0,
                embedding: vec![1.0],
            }],
            2,
        )
        .unwrap_err();
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }
}
