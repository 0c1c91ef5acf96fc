use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_EMBEDDING_CONTEXT_TOKENS: usize = 8191;
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_CHAT_TEMPERATURE: f32 = 0.7;
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_CHAT_MODEL: &str = "tinyllama";
const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
const DEFAULT_COLLECTION_NAME: &str = "it_docs";
const DEFAULT_RETRIEVAL_TOP_K: usize = 4;
const DEFAULT_DOCUMENTS_FOLDER: &str = "downloaded_docs";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration shared by the ingestion pipeline and the query service.
///
/// Built once at process start and handed to components behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secret used for both the embeddings and chat completion APIs.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Vector size used when the server creates the collection.
    pub embedding_dimension: usize,
    /// Token limit of a single embedding input; longer texts are embedded in windows.
    pub embedding_context_tokens: usize,
    /// Backend that writes answers.
    pub chat_provider: ChatProvider,
    /// Chat completion model identifier.
    pub chat_model: String,
    /// Sampling temperature for chat completions.
    pub chat_temperature: f32,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: String,
    /// Model served by Ollama when `chat_provider` is `ollama`.
    pub ollama_chat_model: String,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Collection written by ingestion and read by queries.
    pub qdrant_collection_name: String,
    /// Number of documents handed to the chat model as context.
    pub retrieval_top_k: usize,
    /// Folder scanned for PDF files during ingestion.
    pub documents_folder: PathBuf,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Optional log file path; defaults to `logs/itgenie.log`.
    pub log_file: Option<PathBuf>,
    /// Settings reserved for the SharePoint document source.
    pub sharepoint: SharePointSettings,
}

/// Supported answer-generation backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChatProvider {
    /// Hosted OpenAI chat completions API.
    #[default]
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

impl std::str::FromStr for ChatProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// SharePoint credentials and location. Loaded but not consumed by any pipeline.
#[derive(Debug, Clone, Default)]
pub struct SharePointSettings {
    /// Azure AD application id.
    pub client_id: Option<String>,
    /// Azure AD application secret.
    pub client_secret: Option<String>,
    /// Azure AD tenant id.
    pub tenant_id: Option<String>,
    /// SharePoint site name.
    pub site_name: Option<String>,
    /// Document library name.
    pub doc_lib: Option<String>,
    /// Folder inside the document library.
    pub folder_path: Option<String>,
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// Missing values fall back to defaults or stay `None`; only unparsable numbers fail.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", get("EMBEDDING_DIMENSION"))?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            embedding_context_tokens: parse_or(
                "EMBEDDING_CONTEXT_TOKENS",
                get("EMBEDDING_CONTEXT_TOKENS"),
            )?
            .filter(|tokens: &usize| *tokens > 0)
            .unwrap_or(DEFAULT_EMBEDDING_CONTEXT_TOKENS),
            chat_provider: parse_or("CHAT_PROVIDER", get("CHAT_PROVIDER"))?.unwrap_or_default(),
            chat_model: get("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chat_temperature: parse_or("CHAT_TEMPERATURE", get("CHAT_TEMPERATURE"))?
                .unwrap_or(DEFAULT_CHAT_TEMPERATURE),
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_chat_model: get("OLLAMA_CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_CHAT_MODEL.to_string()),
            qdrant_url: get("QDRANT_URL").unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            qdrant_api_key: get("QDRANT_API_KEY"),
            qdrant_collection_name: get("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            retrieval_top_k: parse_or("RETRIEVAL_TOP_K", get("RETRIEVAL_TOP_K"))?
                .unwrap_or(DEFAULT_RETRIEVAL_TOP_K),
            documents_folder: get("DOCUMENTS_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENTS_FOLDER)),
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT"))?,
            log_file: get("ITGENIE_LOG_FILE").map(PathBuf::from),
            sharepoint: SharePointSettings {
                client_id: get("CLIENT_ID"),
                client_secret: get("CLIENT_SECRET"),
                tenant_id: get("TENANT_ID"),
                site_name: get("SHAREPOINT_SITE_NAME"),
                doc_lib: get("SHAREPOINT_DOC_LIB"),
                folder_path: get("SHAREPOINT_FOLDER_PATH"),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Load `.env` (when present) and read the configuration from the environment.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_model = %config.embedding_model,
        chat_provider = ?config.chat_provider,
        chat_model = %config.chat_model,
        has_openai_key = config.openai_api_key.is_some(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
