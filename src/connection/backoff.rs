//! Reconnect delay policy.

use std::time::Duration;

/// Delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Upper bound on any reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Capped exponential backoff for channel reconnects.
///
/// The delay for a given number of prior consecutive failures is
/// `min(base * 2^failures, max)`: 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...
///
/// Stateless: the failure count lives on the connection, which resets it
/// only when a channel opens successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBackoff {
    base_delay: Duration,
    max_delay: Duration,
}

impl ReconnectBackoff {
    /// Create a backoff with default settings (1s base, 30s max).
    pub fn new() -> Self {
        Self::with_config(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Create a backoff with custom settings.
    pub fn with_config(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after `failures` consecutive failures have already
    /// been counted.
    pub fn delay_for(&self, failures: u32) -> Duration {
        2u32.checked_pow(failures)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}
