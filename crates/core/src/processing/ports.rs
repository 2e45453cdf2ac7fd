//! Port interfaces for item processing and work discovery

use async_trait::async_trait;
use darceo_domain::{DarceoError, ItemId, ProcessOutcome, Result};
use thiserror::Error;

/// Failure raised by an `ItemProcessor`.
///
/// Either variant aborts the running loop with the cursor untouched, so the
/// same item is retried on the next `start()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    /// Transient failure (timeouts, connection resets, 5xx).
    #[error("retryable processing failure: {0}")]
    Retryable(String),

    /// Unexpected failure that needs attention.
    #[error("fatal processing failure: {0}")]
    Fatal(String),
}

impl ProcessError {
    /// Whether retrying later may succeed without operator action.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<ProcessError> for DarceoError {
    fn from(err: ProcessError) -> Self {
        Self::Processing(err.to_string())
    }
}

/// Domain work performed on one item.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Process `item`, reporting a finding, nothing, or that its data is not
    /// available yet.
    async fn process(&self, item: &ItemId) -> std::result::Result<ProcessOutcome, ProcessError>;
}

/// Producer of the item set for a new cycle.
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Identifiers of every item the next cycle should visit.
    async fn discover(&self) -> Result<Vec<ItemId>>;
}
