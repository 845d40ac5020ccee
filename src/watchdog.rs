//! Idle and hard-deadline tracking for a streaming turn.
//!
//! The watchdog is pure over [`Instant`]s: the stream controller feeds it
//! probe ticks and it answers with at most one idle signal and exactly one
//! expiry signal per turn. Token activity resets the idle clock only; the
//! hard deadline runs from turn start no matter what arrives.

use std::time::Duration;

use tokio::time::Instant;

/// Timing constants for a turn.
#[derive(Debug, Clone, Copy)]
pub struct TimingPolicy {
    /// How often the idle probe runs.
    pub idle_check_interval: Duration,

    /// Silence tolerated before the turn is treated as naturally complete.
    pub idle_threshold: Duration,

    /// Absolute per-turn bound, independent of activity.
    pub hard_deadline: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            idle_check_interval: Duration::from_secs(2),
            idle_threshold: Duration::from_secs(5),
            hard_deadline: Duration::from_secs(30),
        }
    }
}

/// A stall or expiry verdict from the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogSignal {
    /// No activity for the idle threshold; treat the turn as complete.
    Idle,

    /// The hard deadline elapsed; the turn must time out.
    Expired,
}

/// Per-turn activity tracker.
#[derive(Debug)]
pub struct Watchdog {
    started_at: Instant,
    last_activity: Instant,
    idle_threshold: Duration,
    hard_deadline: Duration,
    idle_fired: bool,
    expired_fired: bool,
}

impl Watchdog {
    /// Starts a watchdog for a turn beginning at `now`.
    pub fn new(now: Instant, timing: &TimingPolicy) -> Self {
        Self {
            started_at: now,
            last_activity: now,
            idle_threshold: timing.idle_threshold,
            hard_deadline: timing.hard_deadline,
            idle_fired: false,
            expired_fired: false,
        }
    }

    /// Records inbound activity. Resets the idle clock, never the deadline.
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// The instant at which the hard deadline elapses.
    pub fn deadline_at(&self) -> Instant {
        self.started_at + self.hard_deadline
    }

    /// Probes the watchdog. Expiry takes precedence over idleness.
    pub fn check(&mut self, now: Instant) -> Option<WatchdogSignal> {
        if !self.expired_fired && now.duration_since(self.started_at) >= self.hard_deadline {
            self.expired_fired = true;
            return Some(WatchdogSignal::Expired);
        }
        if !self.idle_fired && now.duration_since(self.last_activity) >= self.idle_threshold {
            self.idle_fired = true;
            return Some(WatchdogSignal::Idle);
        }
        None
    }
}
