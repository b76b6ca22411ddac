//! Exponential-backoff reconnect policy.
//!
//! The policy is plain data: it decides *whether* and *how long*, while the
//! connection actor owns the single timer. With the defaults the retries
//! after an abnormal close wait:
//!
//! ```text
//! attempt   1      2      3      4      5       6
//! delay     1s     2s     4s     8s     16s     (none: exhausted)
//! ```
//!
//! Each retry waits the current delay, then the delay doubles (clamped to
//! `max_delay`). A successful open resets both the attempt counter and the
//! delay.

use std::time::Duration;

/// Tunables for [`ReconnectPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Retries allowed between two successful opens.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

/// Reconnect bookkeeping for one connection.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
    delay: Duration,
    paused: bool,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        let delay = config.base_delay.min(config.max_delay);
        Self {
            config,
            attempt: 0,
            delay,
            paused: false,
        }
    }

    /// Claims the next retry.
    ///
    /// Returns how long to wait before dialing, or `None` when paused or out
    /// of attempts. A `Some` counts as an attempt and doubles the delay for
    /// the one after it.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.paused || self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        let wait = self.delay;
        self.delay = self.delay.saturating_mul(2).min(self.config.max_delay);
        Some(wait)
    }

    /// Resets the counters after a successful open. The pause flag is kept.
    pub fn on_open(&mut self) {
        self.attempt = 0;
        self.delay = self.config.base_delay.min(self.config.max_delay);
    }

    /// Back to the initial values, pause flag included.
    pub fn reset(&mut self) {
        self.on_open();
        self.paused = false;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `true` once every allowed retry has been claimed.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The delay the next retry would wait.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
