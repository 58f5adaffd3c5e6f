//! Assertions over run summaries and digests

use cos_select::{RunSummary, TaskStatus};

/// Digest line that marks a timed-out task
pub const TIMEOUT_LINE: &str = "Error: task is timeout";

/// Assert that results are one per descriptor, in input order
pub fn assert_in_order(summary: &RunSummary, keys: &[&str]) {
    let actual: Vec<&str> = summary
        .results
        .iter()
        .map(|r| r.source.key.as_str())
        .collect();
    assert_eq!(actual, keys, "results must follow input order");
    for (position, result) in summary.results.iter().enumerate() {
        assert_eq!(result.index, position);
    }
}

/// Statuses of every result, in order
pub fn statuses(summary: &RunSummary) -> Vec<TaskStatus> {
    summary.results.iter().map(|r| r.status).collect()
}

/// The digest block describing `key`
pub fn block_for(digest: &str, key: &str) -> String {
    let needle = format!("\"key\":\"{key}\"");
    digest
        .split("\nTaskStatus: ")
        .skip(1)
        .find(|block| block.contains(&needle))
        .map(|block| format!("TaskStatus: {block}"))
        .unwrap_or_else(|| panic!("no block for {key} in digest:\n{digest}"))
}
