//! Retry backoff policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default base delay: 1 second, doubled per attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Default delay ceiling: 1 hour.
///
/// Retries keep happening at this cadence indefinitely (until the attempt
/// budget runs out) rather than backing off without bound, which would
/// effectively abandon endpoints that are down for a long time.
pub const DEFAULT_MAX_DELAY_MS: u64 = 3_600_000;

/// Exponential backoff with a ceiling: `min(2^attempt * base, max)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay_ms: base_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    /// Calculate the delay after a given attempt count.
    ///
    /// `attempt` is the value of `attempts` after the failure was recorded,
    /// so the first failed attempt yields `2^1 * base`.
    pub fn delay_for_attempt(&self, attempt: i32) -> Duration {
        let shift = attempt.clamp(0, 62) as u32;
        let ms = (1u64 << shift)
            .saturating_mul(self.base_delay_ms)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Earliest instant the next attempt may run.
    pub fn next_retry_at(&self, now: DateTime<Utc>, attempt: i32) -> DateTime<Utc> {
        now + chrono::Duration::milliseconds(self.delay_for_attempt(attempt).as_millis() as i64)
    }
}
