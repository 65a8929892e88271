//! Error handling for the sync subsystem.
//!
//! Nothing in this crate propagates an error across the producer boundary:
//! enqueue failures are logged and swallowed, and delivery failures are
//! recorded on the event row (`status` + `last_error`). The types here cover
//! the internal plumbing between the store, the worker, and the HTTP client.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A specialized Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Machine-readable error codes, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Store errors
    DatabaseError,
    DuplicateRecord,
    RecordNotFound,

    // Serialization errors
    SerializationError,
    InvalidStatus,

    // Delivery errors
    TransportError,
    RequestTimeout,
    RemoteRejected,

    // Configuration errors
    ConfigurationError,
}

impl ErrorCode {
    /// Coarse category used as a metrics label.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::DatabaseError | Self::DuplicateRecord | Self::RecordNotFound => "store",
            Self::SerializationError | Self::InvalidStatus => "serialization",
            Self::TransportError | Self::RequestTimeout | Self::RemoteRejected => "delivery",
            Self::ConfigurationError => "configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::DuplicateRecord => "DUPLICATE_RECORD",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::SerializationError => "SERIALIZATION_ERROR",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::RemoteRejected => "REMOTE_REJECTED",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Error type for relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate event id {0}")]
    DuplicateEvent(Uuid),

    #[error("event {0} not found")]
    EventNotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid event status '{0}'")]
    InvalidStatus(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cloud endpoint rejected delivery with HTTP {status}")]
    Rejected { status: u16 },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RelayError {
    /// Get the stable error code for this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::DuplicateEvent(_) => ErrorCode::DuplicateRecord,
            Self::EventNotFound(_) => ErrorCode::RecordNotFound,
            Self::Serialization(_) => ErrorCode::SerializationError,
            Self::InvalidStatus(_) => ErrorCode::InvalidStatus,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::Timeout(_) => ErrorCode::RequestTimeout,
            Self::Rejected { .. } => ErrorCode::RemoteRejected,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
        }
    }

    /// Whether retrying the failed operation can plausibly succeed.
    ///
    /// Transport failures, timeouts, non-2xx responses, and store hiccups
    /// are retryable; bad input and configuration are not.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Transport(_) | Self::Timeout(_) | Self::Rejected { .. }
        )
    }

    /// Record this error to the metrics registry.
    pub fn record_metrics(&self) {
        counter!(
            "relay_errors_total",
            "code" => self.code().to_string(),
            "category" => self.code().category(),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}
