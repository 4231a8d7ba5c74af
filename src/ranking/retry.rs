//! Retry policy for ranking API calls
//!
//! Exponential backoff with a cap and a small random jitter. Rate limiting and
//! server errors are retried; a missing character is an answer, not a failure.

use rand::Rng;
use std::time::Duration;

use crate::config::RankingSettings;

/// How a single HTTP status should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 400 and 404: the character or realm does not exist
    NotFound,
    /// 429 and 5xx
    Transient,
    Fatal,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        400 | 404 => StatusClass::NotFound,
        429 | 500..=599 => StatusClass::Transient,
        _ => StatusClass::Fatal,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `[0, backoff * jitter_ratio]`
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(8),
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RankingSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.backoff_base_ms),
            max_delay: Duration::from_millis(settings.backoff_max_ms),
            jitter_ratio: settings.jitter_ratio,
        }
    }

    /// Backoff before retry number `retry` (1-based), without jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Backoff plus jitter, drawing from the supplied generator
    pub fn delay_with_jitter<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let backoff = self.backoff(retry);
        if self.jitter_ratio <= 0.0 {
            return backoff;
        }
        let factor: f64 = rng.random_range(0.0..=self.jitter_ratio);
        backoff + backoff.mul_f64(factor)
    }

    /// Backoff plus jitter from the thread-local generator
    pub fn next_delay(&self, retry: u32) -> Duration {
        self.delay_with_jitter(retry, &mut rand::rng())
    }
}
