//! Retry delay curves
//!
//! Pure: a [`BackoffPolicy`] only computes delays. Sleeping is the caller's job.

use reconflow_config::BackoffSettings;
use std::time::Duration;

/// Exponential backoff with a ceiling; `multiplier == 1.0` gives a fixed interval
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay for the first attempt
    pub initial_delay: Duration,

    /// Ceiling; no delay is ever longer
    pub max_delay: Duration,

    /// Growth factor between attempts, never below 1.0
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::conflict()
    }
}

impl BackoffPolicy {
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1.0,
        }
    }

    /// 1s doubling up to 30s: used between read-modify-write retries
    pub fn conflict() -> Self {
        Self::exponential(Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Fixed 10s: used between operation polls
    pub fn polling() -> Self {
        Self::fixed(Duration::from_secs(10))
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        // f64::max ignores NaN, so NaN becomes 1.0 as well.
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn from_settings(settings: &BackoffSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: 1.0,
        }
        .with_multiplier(settings.multiplier)
    }

    /// Delay before retry number `attempt` (1-based; 0 is treated as 1)
    pub fn next_delay(&self, attempt: u32) -> Duration {
        match self.uncapped_delay(attempt) {
            Some(delay) if delay <= self.max_delay => delay,
            _ => self.max_delay,
        }
    }

    /// Whether the uncapped curve has grown past the ceiling at `attempt`
    pub fn exceeds_ceiling(&self, attempt: u32) -> bool {
        self.uncapped_delay(attempt)
            .map(|delay| delay > self.max_delay)
            .unwrap_or(true)
    }

    fn uncapped_delay(&self, attempt: u32) -> Option<Duration> {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).ok()
    }
}
