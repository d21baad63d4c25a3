//! Fixed and exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::{BackoffStrategy, RetryConfig};

/// Delay policy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    strategy: BackoffStrategy,
    base_ms: u64,
    max_ms: u64,
    jitter: bool,
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            strategy: BackoffStrategy::Fixed,
            base_ms: ms,
            max_ms: ms,
            jitter: false,
        }
    }

    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_ms,
            BackoffStrategy::Exponential => calculate_backoff_ms(attempt, self.base_ms, self.max_ms),
        };

        if !self.jitter {
            return Duration::from_millis(delay_ms);
        }

        // Apply jitter (-10% to +10% of the delay)
        let jitter_range = delay_ms / 10;
        if jitter_range == 0 {
            return Duration::from_millis(delay_ms);
        }
        let low = delay_ms - jitter_range;
        let high = delay_ms + jitter_range;
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(config: &RetryConfig) -> Self {
        let base = Duration::from_millis(config.base_delay_ms);
        let backoff = match config.backoff {
            BackoffStrategy::Fixed => Backoff::fixed(base),
            BackoffStrategy::Exponential => {
                Backoff::exponential(base, Duration::from_millis(config.max_delay_ms))
            }
        };
        backoff.with_jitter(config.jitter)
    }
}

fn calculate_backoff_ms(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    if attempt == 0 {
        return 0;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    base_ms.saturating_mul(exponential_base).min(max_ms)
}
