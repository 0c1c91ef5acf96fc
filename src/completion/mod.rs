//! Chat completion clients used to generate answers.
//!
//! The OpenAI-backed client issues HTTP requests directly to `/chat/completions`, mirroring
//! the embedding adapter. `CHAT_PROVIDER=ollama` switches answering to a local Ollama model.

mod ollama;

pub use ollama::OllamaChatClient;

use crate::config::{ChatProvider, Config};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while requesting a chat completion.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider could not be reached.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions and retrieved context.
    System,
    /// The end user's question.
    User,
}

/// Single message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: ChatRole,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Interface implemented by hosted chat models.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Generate the assistant reply for the given conversation.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatClientError>;
}

/// Build the chat client selected by `Config::chat_provider`.
pub fn build_chat_client(config: &Config) -> Result<Box<dyn ChatClient>, ChatClientError> {
    match config.chat_provider {
        ChatProvider::OpenAI => Ok(Box::new(OpenAiChatClient::new(config)?)),
        ChatProvider::Ollama => Ok(Box::new(OllamaChatClient::new(config)?)),
    }
}

/// Chat client for the OpenAI chat completions API.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiChatClient {
    /// Build a client from the shared configuration.
    pub fn new(config: &Config) -> Result<Self, ChatClientError> {
        let http = Client::builder()
            .user_agent("itgenie/chat")
            .build()
            .map_err(|error| ChatClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.chat_model.clone(),
            temperature: config.chat_temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatClientError> {
        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|error| {
            ChatClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.base_url
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChatClientError::ProviderUnavailable(format!(
                "endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatClientError::InvalidResponse("no choices returned".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
