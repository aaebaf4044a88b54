//! Reconnect policy for the live connection.
//!
//! Pure state, no timers: the sync client asks for the next delay and does
//! the waiting itself, which keeps the backoff schedule deterministically
//! testable.

#[cfg(test)]
#[path = "policy_test.rs"]
mod policy_test;

use std::time::Duration;

/// First retry delay.
pub const BASE_DELAY_MS: u64 = 1000;
/// Ceiling on any retry delay.
pub const MAX_DELAY_MS: u64 = 30_000;
/// Automatic reconnect attempts before giving up.
pub const MAX_ATTEMPTS: u32 = 5;

/// Exponential-backoff schedule with an attempt cap.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReconnectPolicy {
    attempts: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before the next reconnect attempt, or `None` once the cap is
    /// reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= MAX_ATTEMPTS {
            return None;
        }
        self.attempts += 1;
        Some(Duration::from_millis(delay_for_attempt(self.attempts)))
    }

    /// Forget past failures; called after a successful handshake.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts consumed since the last reset.
    #[must_use]
    pub fn attempts(self) -> u32 {
        self.attempts
    }
}

/// Backoff delay for the 1-based attempt number: doubles from
/// [`BASE_DELAY_MS`], capped at [`MAX_DELAY_MS`].
#[must_use]
pub fn delay_for_attempt(attempt: u32) -> u64 {
    let doublings = attempt.saturating_sub(1).min(31);
    BASE_DELAY_MS
        .saturating_mul(1_u64 << doublings)
        .min(MAX_DELAY_MS)
}
