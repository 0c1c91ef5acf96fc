//! Answer generation through a local Ollama runtime.

use super::{ChatClient, ChatClientError, ChatMessage, ChatRole};
use crate::config::Config;
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage as OllamaMessage, request::ChatMessageRequest},
    models::ModelOptions,
};
use reqwest::Url;

/// Chat client backed by the Ollama `/api/chat` endpoint.
pub struct OllamaChatClient {
    ollama: Ollama,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaChatClient {
    /// Build a client from the shared configuration.
    pub fn new(config: &Config) -> Result<Self, ChatClientError> {
        let url = Url::parse(&config.ollama_url).map_err(|error| {
            ChatClientError::ProviderUnavailable(format!(
                "invalid Ollama URL {}: {error}",
                config.ollama_url
            ))
        })?;
        tracing::debug!(
            model = %config.ollama_chat_model,
            base_url = %url,
            "Initialized Ollama chat client"
        );
        Ok(Self {
            ollama: Ollama::from_url(url),
            base_url: config.ollama_url.clone(),
            model: config.ollama_chat_model.clone(),
            temperature: config.chat_temperature,
        })
    }
}

fn to_ollama_message(message: ChatMessage) -> OllamaMessage {
    match message.role {
        ChatRole::System => OllamaMessage::system(message.content),
        ChatRole::User => OllamaMessage::user(message.content),
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatClientError> {
        let request = ChatMessageRequest::new(
            self.model.clone(),
            messages.into_iter().map(to_ollama_message).collect(),
        )
        .options(ModelOptions::default().temperature(self.temperature));

        let response = self
            .ollama
            .send_chat_messages(request)
            .await
            .map_err(|error| {
                tracing::error!(base_url = %self.base_url, error = %error, "Ollama chat failed");
                ChatClientError::GenerationFailed(format!(
                    "Ollama at {} failed: {error}",
                    self.base_url
                ))
            })?;

        Ok(response.message.content)
    }
}
