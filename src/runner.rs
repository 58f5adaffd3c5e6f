//! Sequential, deadline-bounded batch execution
//!
//! Tasks run one at a time in input order. A single [`DeadlineWatcher`]
//! covers the whole batch: when it fires it cancels whichever task is in
//! flight, and every task reached after that point is cancelled before it
//! starts. Every descriptor yields exactly one result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::RunnerConfig;
use crate::conversion::{ConversionTask, TaskHandle};
use crate::deadline::DeadlineWatcher;
use crate::storage::ObjectStorage;
use crate::summary::ReportSummarizer;
use crate::types::{CancellationSignal, ObjectDescriptor, RunSummary};

/// Where a batch run currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunPhase {
    /// Watcher armed, no task started
    Armed,
    /// Walking the task list
    Iterating,
    /// All tasks resolved, watcher being cleared
    Draining,
    /// Summary built
    Done,
}

type CurrentTask = Arc<Mutex<Option<TaskHandle>>>;

fn lock(current: &Mutex<Option<TaskHandle>>) -> MutexGuard<'_, Option<TaskHandle>> {
    current.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deadline trigger: cancel the task in flight, if any
///
/// Returns the index of the task the cancel took effect on. The slot may be
/// empty when the deadline passes between two tasks; the next task then sees
/// the expired watcher before it starts.
fn cancel_current(
    current: &Mutex<Option<TaskHandle>>,
    signal: CancellationSignal,
) -> Option<usize> {
    let slot = lock(current);
    let Some(handle) = slot.as_ref() else {
        tracing::debug!("Deadline reached between tasks");
        return None;
    };
    if !handle.cancel(signal) {
        return None;
    }
    tracing::info!(index = handle.index(), "Cancelled in-flight task");
    Some(handle.index())
}

/// Runs a batch of conversions against one storage client
pub struct TaskRunner {
    storage: Arc<dyn ObjectStorage>,
    config: RunnerConfig,
    summarizer: ReportSummarizer,
}

impl TaskRunner {
    /// Create a runner
    pub fn new(storage: Arc<dyn ObjectStorage>, config: RunnerConfig) -> Self {
        let summarizer = ReportSummarizer::from_config(&config);
        Self {
            storage,
            config,
            summarizer,
        }
    }

    /// The configuration this runner was built with
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every descriptor within `budget` and summarize the outcome
    ///
    /// Never fails; per-object problems, including deadline cancellation, are
    /// reported as failed results in the summary. The configured
    /// `deadline_margin` is subtracted from `budget` before the watcher is
    /// armed.
    pub async fn run_all(
        &self,
        descriptors: Vec<ObjectDescriptor>,
        budget: Duration,
    ) -> RunSummary {
        let signal = CancellationSignal::timeout();
        let current: CurrentTask = Arc::new(Mutex::new(None));

        let tasks: Vec<ConversionTask> = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| {
                ConversionTask::new(
                    index,
                    descriptor,
                    Arc::clone(&self.storage),
                    self.config.retry.clone(),
                )
            })
            .collect();
        let total = tasks.len();

        let effective_budget = budget.saturating_sub(self.config.deadline_margin);
        let watcher = {
            let current = Arc::clone(&current);
            DeadlineWatcher::arm(effective_budget, signal.clone(), move |signal| {
                cancel_current(&current, signal);
            })
        };
        let mut phase = RunPhase::Armed;
        tracing::debug!(
            ?phase,
            total,
            budget_ms = effective_budget.as_millis() as u64,
            "Batch run starting"
        );

        phase = RunPhase::Iterating;
        tracing::debug!(?phase, "Running tasks");
        let mut results = Vec::with_capacity(total);
        for task in tasks {
            *lock(&current) = Some(task.handle());

            if watcher.is_expired() {
                // Fail fast: the task resolves without touching storage
                task.cancel_task(signal.clone());
            }

            let result = task.run_task().await;
            *lock(&current) = None;
            results.push(result);
        }

        phase = RunPhase::Draining;
        tracing::debug!(?phase, fired = watcher.has_fired(), "Clearing deadline watcher");
        watcher.clear();

        let summary = self.summarizer.summarize(results);
        phase = RunPhase::Done;
        tracing::debug!(?phase, status = %summary.status, "Batch run finished");
        summary
    }
}
