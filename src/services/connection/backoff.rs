//! Reconnect Backoff
//!
//! Pure bookkeeping for the reconnect loop: how long to wait before the next
//! attempt, and when to give up.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts before giving up (default: 5)
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff (default: 1000)
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (default: 30000)
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt number `attempt` (zero-based).
    ///
    /// Formula: `min(base_delay_ms * 2^attempt, max_delay_ms)`
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        delay.min(self.max_delay_ms)
    }
}

/// Attempt counter driven by connection lifecycle events.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The connection opened, or an explicit connect was requested.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Explicit disconnect: no automatic reconnect until the next `reset`.
    pub fn suppress(&mut self) {
        self.attempts = self.config.max_attempts;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// The connection closed without an explicit disconnect.
    ///
    /// Returns the delay before the next attempt and counts the attempt, or
    /// `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.config.delay_for_attempt(self.attempts);
        self.attempts += 1;
        Some(Duration::from_millis(delay))
    }
}
