//! Reduction of per-task results into the run digest

use crate::config::RunnerConfig;
use crate::types::{RunSummary, TaskResult, TaskStatus};

/// Folds ordered [`TaskResult`]s into a [`RunSummary`]
///
/// The digest starts with a header block
///
/// ```text
/// Result: select success
/// success: 2
/// total: 2
/// ```
///
/// followed by each task's message blocks in input order. The overall status
/// is `fail` as soon as one task failed.
#[derive(Clone, Debug)]
pub struct ReportSummarizer {
    name: String,
    detail_limit: Option<usize>,
}

impl ReportSummarizer {
    /// Create a summarizer with a header name and an optional cap on detail blocks
    pub fn new(name: impl Into<String>, detail_limit: Option<usize>) -> Self {
        Self {
            name: name.into(),
            detail_limit,
        }
    }

    /// Create a summarizer from runner configuration
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.summary_name.clone(), config.summary_detail_limit)
    }

    /// Reduce results to a summary; `results` must already be in input order
    pub fn summarize(&self, results: Vec<TaskResult>) -> RunSummary {
        let total = results.len();
        let success = results.iter().filter(|r| r.is_success()).count();
        let status = if success == total {
            TaskStatus::Success
        } else {
            TaskStatus::Fail
        };

        // With a cap in place and failures present, failures win the space
        let truncated = self.detail_limit.is_some_and(|limit| total > limit);
        let hide_successes = truncated && success < total;

        let mut messages = vec![format!(
            "Result: {} {status}\nsuccess: {success}\ntotal: {total}",
            self.name
        )];
        let mut shown = 0usize;
        for result in &results {
            if self.detail_limit.is_some_and(|limit| shown >= limit) {
                break;
            }
            if hide_successes && result.is_success() {
                continue;
            }
            shown += 1;
            messages.extend(
                result
                    .messages
                    .iter()
                    .map(|m| normalize_newlines(m))
                    .filter(|m| !m.is_empty()),
            );
        }

        tracing::info!(
            name = %self.name,
            status = %status,
            success,
            total,
            details = shown,
            "Run summarized"
        );

        RunSummary {
            status,
            success,
            total,
            messages,
            results,
        }
    }
}

fn normalize_newlines(message: &str) -> String {
    message
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end_matches('\n')
        .to_string()
}
