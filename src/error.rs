use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AzqrError>;

#[derive(Error, Debug)]
pub enum AzqrError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scanner initialization failed ({scanner}): {message}")]
    Init { scanner: String, message: String },

    #[error("Scanner {0} used before init")]
    NotInitialized(String),

    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Throttled by control plane (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },

    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rule error ({rule_id}): {message}")]
    Rule { rule_id: String, message: String },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AzqrError {
    /// Transient control-plane failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. } | Self::Service { .. } | Self::Network(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl From<reqwest::Error> for AzqrError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
