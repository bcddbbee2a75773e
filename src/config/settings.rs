//! Configuration settings for Pinpoint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest context expansion window accepted, in groups on each side.
pub const MAX_EXPANSION_WINDOW: usize = 50;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcription: TranscriptionSettings,
    pub embedding: EmbeddingSettings,
    pub ingest: IngestSettings,
    pub vector_store: VectorStoreSettings,
    pub jobs: JobStoreSettings,
    pub retrieval: RetrievalSettings,
    pub rerank: RerankSettings,
    pub answer: AnswerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing tenant data, job records and media.
    pub data_dir: String,
    /// Directory for temporary files (extracted audio, splits).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Timeout applied to every remote HTTP call.
    pub request_timeout_secs: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.pinpoint".to_string(),
            temp_dir: "/tmp/pinpoint".to_string(),
            log_level: "info".to_string(),
            request_timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model to use.
    pub model: String,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum concurrent chunk uploads.
    pub max_concurrent_chunks: usize,
    /// Optional language hint (ISO-639-1).
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            chunk_duration_seconds: 600,
            max_concurrent_chunks: 3,
            language: None,
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI embeddings API.
    #[default]
    OpenAI,
    /// Local feature-hashing embedder (no network).
    Hash,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(EmbeddingProvider::OpenAI),
            "hash" | "local" => Ok(EmbeddingProvider::Hash),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai, hash).
    pub provider: EmbeddingProvider,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Ingestion pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Number of consecutive raw segments combined into one segment group.
    pub group_size: usize,
    /// Number of groups embedded and written per batch (one cancellation checkpoint each).
    pub index_batch_size: usize,
    /// How long a finished job stays visible at 100% before its record is cleared.
    pub completion_hold_ms: u64,
    /// How long a failed job shows the "Error" stage before its record is cleared.
    pub error_hold_ms: u64,
    /// Generate a preview thumbnail before transcription.
    pub preview: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            group_size: 3,
            index_batch_size: 8,
            completion_hold_ms: 1500,
            error_hold_ms: 3000,
            preview: true,
        }
    }
}

/// Storage backend shared by the vector store and the job store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// SQLite file under the data directory.
    #[default]
    Sqlite,
    /// Process memory (lost on exit).
    Memory,
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreProvider::Sqlite => write!(f, "sqlite"),
            StoreProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: StoreProvider,
}

/// Job store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JobStoreSettings {
    /// Job store provider (sqlite, memory).
    pub provider: StoreProvider,
}

/// Federated retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Nearest neighbours requested from each collection.
    pub per_collection_k: usize,
    /// Neighbouring groups included on each side during context expansion.
    pub expansion_window: usize,
    /// Candidates kept after reranking.
    pub final_top_k: usize,
    /// Distance above which single-video hits are dropped as irrelevant.
    pub max_distance: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            per_collection_k: 2,
            expansion_window: 1,
            final_top_k: 3,
            max_distance: 1.2,
        }
    }
}

/// Reranker backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RerankProvider {
    /// Local term-overlap scorer.
    #[default]
    Lexical,
    /// Remote cross-encoder behind a `/rerank` endpoint.
    Remote,
}

/// Reranker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    /// Reranker provider (lexical, remote).
    pub provider: RerankProvider,
    /// Base URL of the rerank service (remote provider only).
    pub endpoint: String,
    /// Cross-encoder model name.
    pub model: String,
    /// Environment variable holding the rerank service key.
    pub api_key_env: String,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            provider: RerankProvider::Lexical,
            endpoint: "http://127.0.0.1:8080/".to_string(),
            model: "BAAI/bge-reranker-base".to_string(),
            api_key_env: "RERANK_API_KEY".to_string(),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// First model tried.
    pub primary_model: String,
    /// Model tried when the primary fails.
    pub secondary_model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Environment variable holding the LLM credential.
    pub api_key_env: String,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            primary_model: "gpt-4o-mini".to_string(),
            secondary_model: Some("gpt-3.5-turbo".to_string()),
            temperature: 0.2,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl AnswerSettings {
    /// Read the LLM credential from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.ingest.group_size == 0 {
            return Err(crate::error::PinpointError::Config(
                "ingest.group_size must be at least 1".to_string(),
            ));
        }
        if self.ingest.index_batch_size == 0 {
            return Err(crate::error::PinpointError::Config(
                "ingest.index_batch_size must be at least 1".to_string(),
            ));
        }
        if self.retrieval.per_collection_k == 0 || self.retrieval.final_top_k == 0 {
            return Err(crate::error::PinpointError::Config(
                "retrieval.per_collection_k and retrieval.final_top_k must be at least 1".to_string(),
            ));
        }
        if self.retrieval.expansion_window > MAX_EXPANSION_WINDOW {
            return Err(crate::error::PinpointError::Config(format!(
                "retrieval.expansion_window must be at most {}",
                MAX_EXPANSION_WINDOW
            )));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::PinpointError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pinpoint")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Path of the durable job store.
    pub fn jobs_db_path(&self) -> PathBuf {
        self.data_dir().join("jobs.db")
    }

    /// Root under which each tenant gets its own namespace directory.
    pub fn tenants_dir(&self) -> PathBuf {
        self.data_dir().join("tenants")
    }
}
