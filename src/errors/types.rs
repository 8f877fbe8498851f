use thiserror::Error;

use crate::etl::validation::ValidationError;

#[derive(Debug, Error)]
pub enum SiftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Transient upstream error: {0}")]
    TransientUpstream(String),

    #[error("Permanent upstream error: {0}")]
    PermanentUpstream(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for SiftError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SiftError::Timeout(e.to_string())
        } else {
            SiftError::Network(e.to_string())
        }
    }
}
