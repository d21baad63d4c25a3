//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a raw upstream call up to `max_attempts` times
//! - Stop immediately on non-retryable classifications
//! - Wait a backoff interval between attempts
//!
//! # Design Decisions
//! - Classification comes from `UpstreamError::is_retryable`, never from transport types
//! - The per-attempt deadline is re-applied on every attempt
//! - Exhaustion returns the last error unchanged; the caller records it on the circuit

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::domain::UpstreamError;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::timeouts::with_deadline;

/// State of one `execute` invocation.
#[derive(Debug)]
struct AttemptContext {
    attempt: u32,
    started: Instant,
    last_error: Option<UpstreamError>,
}

impl AttemptContext {
    fn new() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
            last_error: None,
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

/// Bounded-attempt retry for one named operation.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    operation: &'static str,
    max_attempts: u32,
    backoff: Backoff,
    attempt_timeout: Option<Duration>,
}

impl RetryExecutor {
    pub fn new(operation: &'static str, max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            operation,
            max_attempts: max_attempts.max(1),
            backoff,
            attempt_timeout: None,
        }
    }

    pub fn from_config(operation: &'static str, config: &RetryConfig) -> Self {
        Self::new(operation, config.max_attempts, Backoff::from(config))
    }

    /// Bound every attempt with `deadline`.
    pub fn with_attempt_timeout(mut self, deadline: Duration) -> Self {
        self.attempt_timeout = Some(deadline);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `call` until it succeeds, fails non-retryably, or attempts run out.
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut ctx = AttemptContext::new();

        loop {
            ctx.attempt += 1;

            match with_deadline(self.attempt_timeout, call()).await {
                Ok(value) => {
                    if let Some(previous) = ctx.last_error.take() {
                        tracing::info!(
                            operation = self.operation,
                            attempt = ctx.attempt,
                            elapsed_ms = ctx.elapsed_ms(),
                            previous_error = %previous,
                            "Upstream call recovered after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    tracing::debug!(
                        operation = self.operation,
                        attempt = ctx.attempt,
                        error = %err,
                        "Non-retryable upstream failure"
                    );
                    return Err(err);
                }
                Err(err) => {
                    if ctx.attempt >= self.max_attempts {
                        tracing::warn!(
                            operation = self.operation,
                            attempts = ctx.attempt,
                            elapsed_ms = ctx.elapsed_ms(),
                            error = %err,
                            "Retries exhausted"
                        );
                        return Err(err);
                    }

                    let delay = self.backoff.delay(ctx.attempt);
                    tracing::info!(
                        operation = self.operation,
                        attempt = ctx.attempt,
                        elapsed_ms = ctx.elapsed_ms(),
                        delay = ?delay,
                        error = %err,
                        "Retrying upstream call"
                    );
                    metrics::record_retry(self.operation);
                    ctx.last_error = Some(err);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
