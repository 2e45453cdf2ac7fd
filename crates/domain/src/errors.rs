//! Error types used throughout the scheduler crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for darceo
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DarceoError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DarceoError {
    /// Stable label suitable for structured log fields.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::Processing(_) => "processing",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for darceo operations
pub type Result<T> = std::result::Result<T, DarceoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let err = DarceoError::NotFound("worker 'formats'".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"type":"NotFound","message":"worker 'formats'"}"#);

        let back: DarceoError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(DarceoError::Config("x".into()).label(), "config");
        assert_eq!(DarceoError::Processing("x".into()).label(), "processing");
    }
}
