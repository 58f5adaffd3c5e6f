//! Retries for single-response storage calls
//!
//! `head_object`, `put_object` and opening a select stream are retried when
//! the provider reports a transient failure. Output already streamed from a
//! select is never replayed. With the default [`RetryConfig`] a call is tried
//! three times, half a second apart; a multiplier above 1.0 turns the fixed
//! delay into exponential backoff.
//!
//! ```no_run
//! use cos_select::config::RetryConfig;
//! use cos_select::error::TransportError;
//! use cos_select::retry::with_retry;
//!
//! # async fn example() -> Result<(), TransportError> {
//! let config = RetryConfig::default();
//! let length = with_retry(&config, "head_object", || async {
//!     // call the provider here
//!     Ok::<u64, TransportError>(1024)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::TransportError;

/// Classifies failures as worth another try
pub trait IsRetryable {
    /// True for transient failures (timeouts, throttling, resets)
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) | TransportError::Network(_) => true,
            TransportError::Service { status, .. } => *status == 429 || *status >= 500,
            TransportError::NotFound { .. }
            | TransportError::AccessDenied(_)
            | TransportError::Other(_) => false,
        }
    }
}

/// Delay schedule between tries
///
/// Yields `initial_delay`, then each delay times `backoff_multiplier`, never
/// more than `max_delay`. With jitter enabled each yielded delay is stretched
/// by a random factor in `[1, 2]`.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    /// Schedule for `config`
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay,
            max: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let base = self.next.min(self.max);
        self.next = Duration::try_from_secs_f64(base.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max)
            .min(self.max);
        Some(if self.jitter { stretch(base) } else { base })
    }
}

fn stretch(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    delay.mul_f64(factor)
}

/// Run `call` until it succeeds, fails permanently, or retries run out
///
/// `operation` labels the log lines. The last error is returned once
/// `config.max_attempts` retries have been spent. Dropping the returned
/// future abandons both the in-flight call and any pending backoff sleep.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation: &str,
    mut call: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut delays = Backoff::new(config);
    let mut retries = 0u32;

    loop {
        let error = match call().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(operation, retries, "Storage call recovered after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::debug!(operation, error = %error, "Storage call failed permanently");
            return Err(error);
        }
        if retries >= config.max_attempts {
            tracing::error!(
                operation,
                error = %error,
                tries = retries + 1,
                "Storage call failed, retries exhausted"
            );
            return Err(error);
        }

        let delay = delays.next().unwrap_or(config.max_delay);
        retries += 1;
        tracing::warn!(
            operation,
            error = %error,
            retry = retries,
            max_retries = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Storage call failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
