//! Core types for cos-select

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversion::render_destination_key;
use crate::error::TaskError;

/// Select type used when the event does not name one (SQL select)
pub const DEFAULT_SELECT_TYPE: u32 = 2;

/// Location of one stored object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Bucket name (including the appid suffix)
    pub bucket: String,
    /// Region the bucket lives in (e.g., "ap-guangzhou")
    pub region: String,
    /// Object key inside the bucket
    pub key: String,
}

impl ObjectLocation {
    /// Create a new ObjectLocation
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Where select output is written, if anywhere
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Target bucket
    pub bucket: String,
    /// Target region
    pub region: String,
    /// Prefix prepended to every rendered key
    pub prefix: String,
    /// Name template, e.g. `${Name}.json`; empty means `${Key}`
    pub name_format: String,
}

impl Destination {
    /// Resolve the destination object for a given source object
    pub fn location_for(&self, source: &ObjectLocation) -> ObjectLocation {
        ObjectLocation {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            key: render_destination_key(&self.prefix, &self.name_format, source),
        }
    }
}

/// Select request body, mirroring the provider's `SelectRequest` document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelectConfig {
    /// Query expression, e.g. `Select * from COSObject`
    pub expression: String,

    /// Expression language (default: "SQL")
    #[serde(default = "default_expression_type")]
    pub expression_type: String,

    /// Input format description (CSV / JSON block), passed through untouched
    #[serde(default)]
    pub input_serialization: serde_json::Value,

    /// Output format description, passed through untouched
    #[serde(default)]
    pub output_serialization: serde_json::Value,

    /// Progress reporting block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_progress: Option<serde_json::Value>,
}

fn default_expression_type() -> String {
    "SQL".to_string()
}

/// Everything needed to convert one object; never mutated after construction
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDescriptor {
    /// Object to query
    pub source: ObjectLocation,
    /// Where to persist output (None = keep output in the task result)
    pub destination: Option<Destination>,
    /// Provider select type (2 = SQL)
    pub select_type: u32,
    /// Select request body
    pub select_config: SelectConfig,
    /// Maximum size of the source object in bytes (None = unlimited)
    pub source_size_limit: Option<u64>,
    /// Maximum select output buffered in memory in bytes (None = unlimited)
    pub local_size_limit: Option<u64>,
}

/// Invocation-scoped cancellation value
///
/// Built once per invocation and cloned into every cancellation of that
/// invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancellationSignal {
    reason: String,
}

impl CancellationSignal {
    /// Signal used when the invocation deadline expires
    pub fn timeout() -> Self {
        Self::new("task is timeout")
    }

    /// Signal with a custom reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Human-readable reason
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Lifecycle of a conversion task
///
/// `Idle -> Running -> {Completed | Cancelled | Failed}`, or `Idle -> Cancelled`
/// when the deadline passes before the task is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Built but not started
    Idle,
    /// Select / write in flight
    Running,
    /// Finished successfully
    Completed,
    /// Stopped by the deadline
    Cancelled,
    /// Finished with a storage or size-limit failure
    Failed,
}

impl TaskState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed
        )
    }
}

/// Outcome status of a task or a whole run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Everything succeeded
    Success,
    /// At least one step failed
    Fail,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Fail => write!(f, "fail"),
        }
    }
}

/// Operator-facing detail recorded for every task regardless of outcome
#[derive(Clone, Debug, Default, Serialize)]
pub struct TaskDiagnostics {
    /// When the task started running (None if cancelled before starting)
    pub started_at: Option<DateTime<Utc>>,
    /// When the task resolved
    pub finished_at: Option<DateTime<Utc>>,
    /// Bytes of select output collected
    pub bytes_selected: u64,
    /// Object written, if a destination was configured and reached
    pub destination: Option<ObjectLocation>,
    /// Final task state
    pub state: Option<TaskState>,
}

/// Result of one conversion task, in input order
#[derive(Clone, Debug)]
pub struct TaskResult {
    /// Position of the object in the request
    pub index: usize,
    /// The object this result describes
    pub source: ObjectLocation,
    /// success or fail
    pub status: TaskStatus,
    /// Human-readable message blocks for the digest
    pub messages: Vec<String>,
    /// Detail for logging
    pub diagnostics: TaskDiagnostics,
    /// The failure, when status is fail
    pub error: Option<TaskError>,
}

impl TaskResult {
    /// Whether this task succeeded
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    /// Whether this task failed because of deadline cancellation
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(TaskError::is_cancelled)
    }
}

/// Reduced outcome of a whole run
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// fail iff any task failed
    pub status: TaskStatus,
    /// Number of successful tasks
    pub success: usize,
    /// Number of tasks in the run
    pub total: usize,
    /// Header block followed by per-task blocks, newline-normalized
    pub messages: Vec<String>,
    /// Every task result, in input order
    pub results: Vec<TaskResult>,
}

impl RunSummary {
    /// Number of failed tasks
    pub fn failed(&self) -> usize {
        self.total - self.success
    }

    /// Condensed digest returned (or raised) at the host boundary
    pub fn digest(&self) -> String {
        self.messages.join("\n")
    }
}

/// Per-invocation values supplied by the serverless host
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HostContext {
    /// Time left before the host kills the invocation, in milliseconds
    pub remaining_time_ms: u64,
    /// Host request id, used only for log correlation
    #[serde(default)]
    pub request_id: Option<String>,
}
