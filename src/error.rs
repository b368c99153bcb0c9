//! Error types for the command gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the command gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad user input
    #[error("validation error: {0}")]
    Validation(String),

    /// LLM provider failure (network, auth, rate limit)
    #[error("llm error: {0}")]
    Llm(String),

    /// LLM answered, but not in the expected shape
    #[error("malformed llm output: {0}")]
    MalformedLlmOutput(String),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Messaging channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// Scheduler error
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl Error {
    /// Whether this error came from a remote service rather than local state
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Llm(_) | Self::Embedding(_) | Self::Channel(_)
        )
    }
}
