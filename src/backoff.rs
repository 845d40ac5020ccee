//! Reconnection backoff policy.
//!
//! A pure mapping from retry attempt number to delay, with a hard ceiling on
//! attempts. No clock and no I/O; the stream controller owns the waiting.

use std::time::Duration;

/// Maximum automatic reconnection attempts per turn.
pub const MAX_RETRIES: u32 = 3;

/// What to do before the next reconnection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Wait this long, then reconnect.
    Delay(Duration),

    /// The ladder is spent; the turn must fail instead of reconnecting.
    Exhausted,
}

/// Exponential backoff ladder: `2^attempt` units for attempts `1..=max`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    max_retries: u32,
    unit: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            unit: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with a custom ceiling and time unit.
    pub fn new(max_retries: u32, unit: Duration) -> Self {
        Self { max_retries, unit }
    }

    /// Returns the attempt ceiling.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the decision for a 1-indexed attempt number.
    ///
    /// Attempts outside `[1, max_retries]` are exhausted.
    pub fn delay(&self, attempt: u32) -> BackoffDecision {
        if attempt < 1 || attempt > self.max_retries {
            return BackoffDecision::Exhausted;
        }
        BackoffDecision::Delay(self.unit * 2u32.pow(attempt))
    }
}
