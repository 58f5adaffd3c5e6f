//! Configuration types for cos-select

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration for [`TaskRunner`](crate::runner::TaskRunner) and the host boundary
///
/// Every field has a default, so `RunnerConfig::default()` (or an empty JSON
/// object) reproduces the stock handler behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Retry behavior for non-streaming storage calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Name shown in the digest header, `Result: <name> success|fail` (default: "select")
    #[serde(default = "default_summary_name")]
    pub summary_name: String,

    /// Maximum per-task blocks in the digest (None = every task, the default)
    ///
    /// When the limit truncates the list and at least one task failed, success
    /// blocks are dropped so the failures stay visible.
    #[serde(default)]
    pub summary_detail_limit: Option<usize>,

    /// When the batch is reported as failed to the host (default: any failure)
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Slack subtracted from the host budget before arming the deadline (default: 0)
    #[serde(default, with = "duration_millis")]
    pub deadline_margin: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            summary_name: default_summary_name(),
            summary_detail_limit: None,
            failure_policy: FailurePolicy::default(),
            deadline_margin: Duration::ZERO,
        }
    }
}

impl RunnerConfig {
    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.summary_detail_limit == Some(0) {
            return Err(Error::Config {
                message: "summary_detail_limit must be at least 1 when set".to_string(),
                key: Some("summary_detail_limit".to_string()),
            });
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff_multiplier must be a finite value >= 1.0, got {}",
                    self.retry.backoff_multiplier
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

/// Retry configuration for transient storage failures
///
/// Defaults match the stock handler: three tries in total, half a second apart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "duration_millis")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 5 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 1.0, i.e. fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Aggregate rule deciding whether the host sees the invocation as failed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed object fails the invocation (default)
    #[default]
    AnyFailure,
    /// Fail only when no object succeeded
    AllFailed,
}

impl FailurePolicy {
    /// Apply the policy to a run's counts
    pub fn is_failure(&self, success: usize, total: usize) -> bool {
        match self {
            FailurePolicy::AnyFailure => success < total,
            FailurePolicy::AllFailed => total > 0 && success == 0,
        }
    }
}

fn default_summary_name() -> String {
    "select".to_string()
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

// Durations travel as integer milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
