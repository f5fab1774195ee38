//! Error types for bookings-sync
//!
//! A single error enum covers the whole pipeline so that every stage
//! reports failures through the same type and the binary entry point is
//! the only place that decides exit codes.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration missing or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Source database unreachable or the extraction query was rejected
    #[error("source error: {0}")]
    Source(String),

    /// Delivery endpoint rejected our credential (HTTP 401)
    #[error("authentication rejected by ingestion endpoint (401): verify the API key matches the server")]
    AuthRejected,

    /// Delivery endpoint has no ingestion credential configured (HTTP 503)
    #[error("ingestion endpoint reports its API key is not configured (503)")]
    CredentialNotConfigured,

    /// A single delivery attempt failed in a retryable way
    #[error("transient delivery failure: {0}")]
    TransientDelivery(String),

    /// All delivery attempts for one batch were used up
    #[error("delivery failed after {attempts} attempts: {last_error}")]
    DeliveryExhausted { attempts: u32, last_error: String },

    /// Watermark file could not be read or written
    #[error("watermark storage error: {0}")]
    Storage(String),

    /// JSON error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Check if a single delivery attempt with this error may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientDelivery(_))
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a transient delivery error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientDelivery(msg.into())
    }

    /// Create a watermark storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
