//! Error types for Pinpoint.

use thiserror::Error;

/// Library-level error type for Pinpoint operations.
#[derive(Error, Debug)]
pub enum PinpointError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tenant could not be resolved: {0}")]
    TenantUnresolvable(String),

    /// A job record could not be read or parsed. Never escapes the job store.
    #[error("Transient job store error: {0}")]
    TransientIo(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Job cancelled for video: {0}")]
    Cancelled(String),

    #[error("A job is already active for video: {0}")]
    JobAlreadyActive(String),

    #[error("Remote model error: {0}")]
    RemoteModel(String),

    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Rerank failed: {0}")]
    Rerank(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Pinpoint operations.
pub type Result<T> = std::result::Result<T, PinpointError>;
