//! Provisioning configuration
//!
//! - `ProvisionConfig`: polling cadence and termination guards
//! - `IndexManifest`: YAML v1 description of a whole batch

pub mod error;
pub mod manifest;

pub use error::{ConfigError, ConfigResult};
pub use manifest::IndexManifest;

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_poll_interval_secs() -> u64 {
    10
}

// One hour at the default cadence
fn default_max_poll_rounds() -> u32 {
    360
}

fn default_poll_concurrency() -> usize {
    8
}

/// Reconciliation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Seconds between status polling rounds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Give up after this many rounds; 0 disables the guard
    #[serde(default = "default_max_poll_rounds")]
    pub max_poll_rounds: u32,

    /// Wall-clock budget for the reconciliation phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// Maximum status queries in flight per round
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_rounds: default_max_poll_rounds(),
            deadline_secs: None,
            poll_concurrency: default_poll_concurrency(),
        }
    }
}

impl ProvisionConfig {
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn max_poll_rounds(mut self, rounds: u32) -> Self {
        self.max_poll_rounds = rounds;
        self
    }

    pub fn deadline_secs(mut self, secs: u64) -> Self {
        self.deadline_secs = Some(secs);
        self
    }

    pub fn poll_concurrency(mut self, concurrency: usize) -> Self {
        self.poll_concurrency = concurrency;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// `None` when unbounded
    pub fn round_limit(&self) -> Option<u32> {
        (self.max_poll_rounds > 0).then_some(self.max_poll_rounds)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_secs == 0 || self.poll_interval_secs > 3600 {
            return Err(ConfigError::range_with_hint(
                "poll_interval_secs",
                self.poll_interval_secs,
                1,
                3600,
                "Index builds take minutes; poll at most once per second",
            ));
        }

        if self.poll_concurrency == 0 || self.poll_concurrency > 256 {
            return Err(ConfigError::range_with_hint(
                "poll_concurrency",
                self.poll_concurrency,
                1,
                256,
                "At least one status query must be allowed in flight",
            ));
        }

        if let Some(deadline) = self.deadline_secs {
            if deadline < self.poll_interval_secs {
                return Err(ConfigError::Invalid(format!(
                    "deadline_secs ({}) is shorter than one poll interval ({}s)",
                    deadline, self.poll_interval_secs
                )));
            }
        }

        Ok(())
    }
}
