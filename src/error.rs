//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

/// Boxed error carried by backing-store adapters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Store Error Enum ==
/// Failure reported by a backing-store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not serve the request
    #[error("Backing store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The call did not complete before its deadline
    #[error("Backing store call timed out")]
    TimedOut,
}

impl StoreError {
    /// Creates an `Unavailable` error with no underlying cause.
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an `Unavailable` error wrapping the adapter's own error.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A mandatory policy was not supplied
    #[error("Missing required policy: {0}")]
    MissingPolicy(&'static str),

    /// Backing store failure surfaced to the caller
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The scheduler no longer accepts work
    #[error("Scheduler has been shut down")]
    SchedulerShutdown,

    /// The scheduler runtime could not be started
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

// == Result Type Aliases ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result of a single backing-store call.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
