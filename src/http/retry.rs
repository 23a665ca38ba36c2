//! Retry policy
//!
//! Immutable; the client carries the attempt counter for each submission.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per row, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay_ms: u64,
    /// Growth factor applied per further attempt
    pub backoff_multiplier: f64,
    /// Upper bound for any single backoff delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default delay cap
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            backoff_multiplier,
            ..Self::default()
        }
    }

    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `initial * multiplier^(attempt - 1)`, capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.clamp(0.0, self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `attempt` failures
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// The full sequence of backoff delays a row sees when every attempt fails
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}
