//! Conversion task lifecycle: head, select, collect, write, report.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::select::collect_limited;
use crate::config::RetryConfig;
use crate::error::{SizeLimitKind, TaskError};
use crate::retry::with_retry;
use crate::storage::{ObjectStorage, SelectRequest};
use crate::types::{
    CancellationSignal, ObjectDescriptor, ObjectLocation, TaskDiagnostics, TaskResult, TaskState,
    TaskStatus,
};

/// Bytes of select output echoed into the result when no destination is set
const RESULT_PREVIEW_BYTES: usize = 1024;

/// One unit of work: select one object and optionally persist the output
///
/// `run_task` consumes the task, so a task runs at most once. Cancellation is
/// reached through a [`TaskHandle`], which stays usable while `run_task` is
/// awaited.
pub struct ConversionTask {
    index: usize,
    descriptor: ObjectDescriptor,
    storage: Arc<dyn ObjectStorage>,
    retry: RetryConfig,
    handle: TaskHandle,
}

/// Cancellation hook for a [`ConversionTask`]
#[derive(Clone)]
pub struct TaskHandle {
    index: usize,
    control: Arc<TaskControl>,
}

struct TaskControl {
    slot: Mutex<ControlSlot>,
    token: CancellationToken,
}

struct ControlSlot {
    state: TaskState,
    signal: Option<CancellationSignal>,
}

impl TaskControl {
    fn lock(&self) -> MutexGuard<'_, ControlSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self) -> CancellationSignal {
        self.lock()
            .signal
            .clone()
            .unwrap_or_else(CancellationSignal::timeout)
    }
}

impl TaskHandle {
    /// Position of the task in the request
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.control.lock().state
    }

    /// Cancel the task with `signal`
    ///
    /// - Idle: the task is marked cancelled and `run_task` resolves at once.
    /// - Running: the in-flight storage call is abandoned and `run_task`
    ///   resolves with a cancellation failure, even if the storage work
    ///   finished in the meantime.
    /// - Already cancelled or finished: no-op.
    ///
    /// Returns whether this call had any effect. `true` means the task's
    /// result will report the cancellation.
    pub fn cancel(&self, signal: CancellationSignal) -> bool {
        let mut slot = self.control.lock();
        match slot.state {
            TaskState::Idle => {
                slot.state = TaskState::Cancelled;
                slot.signal = Some(signal);
                true
            }
            TaskState::Running if slot.signal.is_none() => {
                slot.signal = Some(signal);
                drop(slot);
                self.control.token.cancel();
                true
            }
            _ => false,
        }
    }
}

/// What a successful run produced
struct Execution {
    bytes_selected: u64,
    destination: Option<ObjectLocation>,
    preview: Option<String>,
}

impl ConversionTask {
    /// Build an idle task for one object
    pub fn new(
        index: usize,
        descriptor: ObjectDescriptor,
        storage: Arc<dyn ObjectStorage>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            index,
            descriptor,
            storage,
            retry,
            handle: TaskHandle {
                index,
                control: Arc::new(TaskControl {
                    slot: Mutex::new(ControlSlot {
                        state: TaskState::Idle,
                        signal: None,
                    }),
                    token: CancellationToken::new(),
                }),
            },
        }
    }

    /// Position of the task in the request
    pub fn index(&self) -> usize {
        self.index
    }

    /// The object this task converts
    pub fn descriptor(&self) -> &ObjectDescriptor {
        &self.descriptor
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.handle.state()
    }

    /// A cancellation hook that outlives the borrow of this task
    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }

    /// Cancel this task; see [`TaskHandle::cancel`]
    pub fn cancel_task(&self, signal: CancellationSignal) -> bool {
        self.handle.cancel(signal)
    }

    /// Run the conversion and report its outcome
    ///
    /// Never fails: size-limit, transport and cancellation errors all become a
    /// `fail` [`TaskResult`].
    pub async fn run_task(self) -> TaskResult {
        let control = Arc::clone(&self.handle.control);

        let cancelled_before_start = {
            let mut slot = control.lock();
            if slot.state == TaskState::Idle {
                slot.state = TaskState::Running;
                false
            } else {
                true
            }
        };
        if cancelled_before_start {
            tracing::debug!(
                index = self.index,
                key = %self.descriptor.source.key,
                "Task cancelled before start"
            );
            return self.finish(Err(TaskError::Cancelled(control.signal())), None);
        }

        let started_at = Utc::now();
        tracing::debug!(
            index = self.index,
            bucket = %self.descriptor.source.bucket,
            key = %self.descriptor.source.key,
            storage = self.storage.name(),
            "Task started"
        );

        let outcome = tokio::select! {
            biased;
            _ = control.token.cancelled() => Err(TaskError::Cancelled(control.signal())),
            result = self.execute() => result,
        };

        self.finish(outcome, Some(started_at))
    }

    async fn execute(&self) -> Result<Execution, TaskError> {
        let source = &self.descriptor.source;
        let storage = &self.storage;

        if let Some(limit) = self.descriptor.source_size_limit {
            let meta = with_retry(&self.retry, "head_object", move || {
                storage.head_object(source)
            })
            .await?;
            if meta.content_length > limit {
                return Err(TaskError::SizeLimitExceeded {
                    kind: SizeLimitKind::Source,
                    limit,
                    actual: meta.content_length,
                });
            }
        }

        let request = SelectRequest {
            location: source.clone(),
            select_type: self.descriptor.select_type,
            config: self.descriptor.select_config.clone(),
        };
        let request = &request;
        let stream = with_retry(&self.retry, "select_object", move || {
            storage.select_object(request)
        })
        .await?;
        let body = collect_limited(stream, self.descriptor.local_size_limit).await?;
        let bytes_selected = body.len() as u64;

        let Some(destination) = &self.descriptor.destination else {
            let preview = String::from_utf8_lossy(&body[..body.len().min(RESULT_PREVIEW_BYTES)])
                .into_owned();
            return Ok(Execution {
                bytes_selected,
                destination: None,
                preview: Some(preview),
            });
        };

        let target = destination.location_for(source);
        {
            let target = &target;
            let body = &body;
            with_retry(&self.retry, "put_object", move || {
                storage.put_object(target, body.clone())
            })
            .await?;
        }

        Ok(Execution {
            bytes_selected,
            destination: Some(target),
            preview: None,
        })
    }

    fn finish(
        &self,
        outcome: Result<Execution, TaskError>,
        started_at: Option<DateTime<Utc>>,
    ) -> TaskResult {
        let (outcome, state) = {
            let mut slot = self.handle.control.lock();
            // A cancel acknowledged before this point wins over a late natural outcome
            let outcome = match &slot.signal {
                Some(signal) => Err(TaskError::Cancelled(signal.clone())),
                None => outcome,
            };
            let state = match &outcome {
                Ok(_) => TaskState::Completed,
                Err(e) if e.is_cancelled() => TaskState::Cancelled,
                Err(_) => TaskState::Failed,
            };
            slot.state = state;
            (outcome, state)
        };

        let source = &self.descriptor.source;
        let params = serde_json::json!({
            "bucket": source.bucket,
            "region": source.region,
            "key": source.key,
        });
        let mut diagnostics = TaskDiagnostics {
            started_at,
            finished_at: Some(Utc::now()),
            state: Some(state),
            ..Default::default()
        };

        match outcome {
            Ok(execution) => {
                let mut result = serde_json::json!({ "bytesSelected": execution.bytes_selected });
                if let Some(target) = &execution.destination {
                    result["target"] = serde_json::json!({
                        "bucket": target.bucket,
                        "region": target.region,
                        "key": target.key,
                    });
                }
                if let Some(preview) = &execution.preview {
                    result["content"] = serde_json::Value::String(preview.clone());
                }

                tracing::info!(
                    index = self.index,
                    bucket = %source.bucket,
                    key = %source.key,
                    bytes = execution.bytes_selected,
                    target = execution.destination.as_ref().map(|t| t.to_string()),
                    "Conversion task succeeded"
                );

                diagnostics.bytes_selected = execution.bytes_selected;
                diagnostics.destination = execution.destination;
                TaskResult {
                    index: self.index,
                    source: source.clone(),
                    status: TaskStatus::Success,
                    messages: vec![format!(
                        "TaskStatus: success\nParams: {params}\nResult: {result}"
                    )],
                    diagnostics,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(
                    index = self.index,
                    bucket = %source.bucket,
                    key = %source.key,
                    error = %error,
                    cancelled = error.is_cancelled(),
                    "Conversion task failed"
                );

                TaskResult {
                    index: self.index,
                    source: source.clone(),
                    status: TaskStatus::Fail,
                    messages: vec![format!("TaskStatus: fail\nParams: {params}\nError: {error}")],
                    diagnostics,
                    error: Some(error),
                }
            }
        }
    }
}
