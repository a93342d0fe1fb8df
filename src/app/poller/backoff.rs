//! Truncated exponential backoff for report status polling
//!
//! Polling backoff spaces out status checks for a job that is known to be
//! making progress, so unlike request retry backoff it applies no jitter: the
//! schedule is fully determined by the policy's parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::polling;
use crate::errors::{ConfigError, ConfigResult};

/// Exponential polling schedule with an overall elapsed-time budget
///
/// Each call to [`next_interval`](Self::next_interval) hands out the current
/// interval and grows it by `multiplier`, capped at `max_interval`. Waits are
/// accounted against `max_elapsed`; once the next wait would push the
/// cumulative total past the budget the policy returns `None` and keeps doing
/// so until [`reset`](Self::reset).
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial_interval: Duration,
    max_interval: Duration,
    max_elapsed: Duration,
    multiplier: f64,
    current_interval: Duration,
    elapsed: Duration,
    exhausted: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            polling::INITIAL_INTERVAL,
            polling::MAX_INTERVAL,
            polling::MAX_ELAPSED,
        )
    }
}

impl BackoffPolicy {
    /// Creates a policy with the default ×1.5 growth factor
    ///
    /// An initial interval larger than `max_interval` is clamped to it.
    pub fn new(initial_interval: Duration, max_interval: Duration, max_elapsed: Duration) -> Self {
        let initial_interval = initial_interval.min(max_interval);
        Self {
            initial_interval,
            max_interval,
            max_elapsed,
            multiplier: polling::MULTIPLIER,
            current_interval: initial_interval,
            elapsed: Duration::ZERO,
            exhausted: false,
        }
    }

    /// Replaces the growth factor; values below 1.0 are raised to 1.0 so the
    /// schedule never shrinks
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Returns the next wait, or `None` when the elapsed budget is spent
    pub fn next_interval(&mut self) -> Option<Duration> {
        if self.exhausted {
            return None;
        }

        let interval = self.current_interval;
        let total = self.elapsed.saturating_add(interval);
        if total > self.max_elapsed {
            self.exhausted = true;
            return None;
        }

        self.elapsed = total;
        self.current_interval = self.grow(interval);
        Some(interval)
    }

    /// Restarts the schedule from the initial interval with a fresh budget
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
        self.elapsed = Duration::ZERO;
        self.exhausted = false;
    }

    /// Total wait handed out since creation or the last reset
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn grow(&self, interval: Duration) -> Duration {
        // Whole milliseconds keep the schedule reproducible
        let next_millis = interval.as_millis() as f64 * self.multiplier;
        if next_millis >= self.max_interval.as_millis() as f64 {
            self.max_interval
        } else {
            Duration::from_millis(next_millis as u64).max(interval)
        }
    }
}

/// Serializable polling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// First wait between status checks
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    /// Longest wait between status checks
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
    /// Give up once this much time has been spent waiting
    #[serde(with = "humantime_serde")]
    pub max_elapsed: Duration,
    /// Growth factor per poll
    pub multiplier: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval: polling::INITIAL_INTERVAL,
            max_interval: polling::MAX_INTERVAL,
            max_elapsed: polling::MAX_ELAPSED,
            multiplier: polling::MULTIPLIER,
        }
    }
}

impl PollingConfig {
    /// Rejects settings that cannot produce a sensible schedule
    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_interval.is_zero() {
            return Err(ConfigError::invalid(
                "polling.initial_interval",
                "0s",
                "The first polling interval must be greater than zero",
            ));
        }
        if self.max_interval < self.initial_interval {
            return Err(ConfigError::invalid(
                "polling.max_interval",
                format!("{:?}", self.max_interval),
                "Must be at least polling.initial_interval",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "polling.multiplier",
                self.multiplier.to_string(),
                "Must be a finite number of at least 1.0",
            ));
        }
        Ok(())
    }

    /// Builds a fresh policy for one polling session
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.initial_interval, self.max_interval, self.max_elapsed)
            .with_multiplier(self.multiplier)
    }
}
