//! Tuning settings for waiting and reconciliation
//!
//! All durations are integer milliseconds, matching how they are written in
//! the YAML file.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backoff curve for conflict / rate-limit retries
    pub conflict_backoff: BackoffSettings,

    /// Operation polling
    pub poll: PollSettings,

    /// Reconciliation bounds
    pub converge: ConvergeSettings,
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.conflict_backoff.multiplier >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "conflict_backoff.multiplier",
                reason: format!("must be >= 1.0, got {}", self.conflict_backoff.multiplier),
            });
        }
        if self.conflict_backoff.max_delay_ms < self.conflict_backoff.initial_delay_ms {
            return Err(ConfigError::Invalid {
                field: "conflict_backoff.max_delay_ms",
                reason: "must not be smaller than initial_delay_ms".to_string(),
            });
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll.interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.converge.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "converge.max_attempts",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Fixed interval between operation polls
    pub interval_ms: u64,
    /// Upper bound on a single wait
    pub max_wait_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            max_wait_ms: 20 * 60 * 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergeSettings {
    pub max_attempts: u32,
    pub max_elapsed_ms: u64,
    /// Sleep after a successful write; 0 disables it
    pub settle_delay_ms: u64,
    /// Reads that must show the write before converge returns; 0 disables it
    pub verify_confirmations: u32,
}

impl Default for ConvergeSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_elapsed_ms: 10 * 60 * 1_000,
            settle_delay_ms: 0,
            verify_confirmations: 0,
        }
    }
}
