//! Error types for cos-select
//!
//! Errors are split by where they are allowed to surface:
//! - [`TaskError`] covers everything that can go wrong inside one conversion
//!   task. It never escapes
//!   [`ConversionTask::run_task`](crate::conversion::ConversionTask::run_task);
//!   it is folded into a failed [`TaskResult`](crate::types::TaskResult)
//!   instead.
//! - [`TransportError`] is what an [`ObjectStorage`](crate::storage::ObjectStorage)
//!   implementation reports (network, auth, not-found, throttling).
//! - [`Error`] is the crate-level error returned at the invocation boundary.

use crate::types::CancellationSignal;
use thiserror::Error;

/// Result type alias for cos-select operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cos-select
///
/// Only a rejected setup (config or event) and the aggregate run decision are
/// reported through this type; per-object failures stay inside the run
/// summary.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "summary_detail_limit")
        key: Option<String>,
    },

    /// The invocation event could not be turned into object descriptors
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The batch was judged failed by the configured failure policy.
    ///
    /// Carries the same digest that would have been returned on success so the
    /// host logs the full per-object outcome.
    #[error("{digest}")]
    AggregateFailure {
        /// Ordered, newline-joined run digest
        digest: String,
        /// Number of objects that failed
        failed: usize,
        /// Number of objects in the batch
        total: usize,
    },
}

/// Which configured byte limit was exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimitKind {
    /// `sourceSizeLimit`: size of the stored object before any select runs
    Source,
    /// `localSizeLimit`: bytes of select output buffered in memory
    Local,
}

impl std::fmt::Display for SizeLimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeLimitKind::Source => write!(f, "source object"),
            SizeLimitKind::Local => write!(f, "select output"),
        }
    }
}

/// Failure of a single conversion task
///
/// Deadline cancellation is recognizable by its variant alone.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// A configured byte limit was exceeded; no further I/O is issued
    #[error("{kind} size {actual} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded {
        /// Which limit tripped
        kind: SizeLimitKind,
        /// The configured limit in bytes
        limit: u64,
        /// Bytes observed when the limit tripped (a lower bound for streamed output)
        actual: u64,
    },

    /// The task was cancelled by the invocation deadline
    #[error("{0}")]
    Cancelled(CancellationSignal),

    /// The storage client reported a failure
    #[error("{0}")]
    Transport(#[from] TransportError),
}

impl TaskError {
    /// Returns true if this failure was caused by deadline cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled(_))
    }
}

/// Failure reported by an object storage client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The requested object or bucket does not exist
    #[error("object not found: {bucket}/{key}")]
    NotFound {
        /// Bucket that was queried
        bucket: String,
        /// Key that was queried
        key: String,
    },

    /// Credentials were rejected or lack permission
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The service answered with an error status
    #[error("service error (status {status}): {message}")]
    Service {
        /// HTTP status code returned by the service
        status: u16,
        /// Error message returned by the service
        message: String,
    },

    /// Connection-level failure (reset, refused, DNS)
    #[error("network error: {0}")]
    Network(String),

    /// Anything the client could not classify
    #[error("{0}")]
    Other(String),
}
