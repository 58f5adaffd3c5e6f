//! # cos-select
//!
//! Deadline-bounded runner for object storage select conversions.
//!
//! One invocation carries a list of objects and a select request. Each object
//! is queried in turn, the output is optionally written back to a destination
//! bucket, and the whole batch is reduced to a plain-text digest. All work
//! happens within the host's remaining execution time: when that runs out the
//! in-flight request is abandoned and every object not yet reached is reported
//! as timed out, so the host always gets an answer.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No runtime, no logging subscriber; the host binary
//!   brings both
//! - **Storage as a collaborator** - The provider SDK sits behind the
//!   [`ObjectStorage`] trait
//! - **Every object reported** - Per-object failures never abort the batch
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cos_select::{HostContext, InMemoryStorage, RunnerConfig, handle_event};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(InMemoryStorage::new());
//!     let event = serde_json::json!({
//!         "objects": [{"bucket": "logs-1250000000", "region": "ap-guangzhou", "key": "a.csv"}],
//!         "cosSelectConfig": {
//!             "Expression": "Select * from COSObject",
//!             "InputSerialization": {"CSV": {"FileHeaderInfo": "USE"}},
//!             "OutputSerialization": {"JSON": {"RecordDelimiter": "\n"}}
//!         },
//!         "targetBucket": "out-1250000000",
//!         "targetRegion": "ap-guangzhou",
//!         "targetNameFormat": "${Name}.json"
//!     });
//!     let context = HostContext {
//!         remaining_time_ms: 60_000,
//!         request_id: None,
//!     };
//!
//!     let digest = handle_event(storage, event, context, &RunnerConfig::default()).await?;
//!     println!("{digest}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Per-object conversion tasks
pub mod conversion;
/// Invocation deadline tracking
pub mod deadline;
/// Error types
pub mod error;
/// Host boundary
pub mod handler;
/// Invocation event parsing
pub mod invocation;
/// Retry logic with exponential backoff
pub mod retry;
/// Sequential batch runner
pub mod runner;
/// Object storage collaborator
pub mod storage;
/// Run digest reduction
pub mod summary;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{FailurePolicy, RetryConfig, RunnerConfig};
pub use conversion::{ConversionTask, DEFAULT_NAME_FORMAT, TaskHandle, render_destination_key};
pub use deadline::DeadlineWatcher;
pub use error::{Error, Result, SizeLimitKind, TaskError, TransportError};
pub use handler::handle_event;
pub use invocation::Invocation;
pub use runner::TaskRunner;
pub use storage::{InMemoryStorage, ObjectMeta, ObjectStorage, SelectRequest, SelectStream};
pub use summary::ReportSummarizer;
pub use types::{
    CancellationSignal, DEFAULT_SELECT_TYPE, Destination, HostContext, ObjectDescriptor,
    ObjectLocation, RunSummary, SelectConfig, TaskDiagnostics, TaskResult, TaskState, TaskStatus,
};
