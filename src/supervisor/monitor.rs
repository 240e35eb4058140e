//! Consecutive-timeout counting.
//!
//! [`FailureMonitor`] is pure policy: it is told about every finished
//! command and answers whether the link should be reconnected. It also
//! remembers when the last command finished, which drives the keepalive
//! idle check.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;

// ============================================================================
// Outcome
// ============================================================================

/// Classification of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Command succeeded.
    Success,
    /// Transceiver did not answer in time.
    Timeout,
    /// Any other error.
    Failed,
}

impl Outcome {
    /// Classifies a command result.
    pub(crate) fn of(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) if e.is_timeout() => Self::Timeout,
            Err(_) => Self::Failed,
        }
    }
}

// ============================================================================
// Verdict
// ============================================================================

/// What the supervisor should do after an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Keep going.
    Continue,
    /// The timeout threshold was reached; reconnect.
    Reconnect,
}

// ============================================================================
// FailureMonitor
// ============================================================================

/// Counts consecutive command timeouts.
#[derive(Debug, Clone)]
pub(crate) struct FailureMonitor {
    /// Timeouts in a row since the last non-timeout outcome.
    consecutive_timeouts: u32,
    /// When the last command finished (or the epoch started).
    last_finished_at: Instant,
    /// Timeouts that trigger a reconnect.
    threshold: u32,
}

impl FailureMonitor {
    /// Creates a monitor with the given reconnect threshold.
    pub(crate) fn new(threshold: u32, now: Instant) -> Self {
        Self {
            consecutive_timeouts: 0,
            last_finished_at: now,
            threshold: threshold.max(1),
        }
    }

    /// Clears the counter and restarts the idle clock for a new epoch.
    pub(crate) fn reset(&mut self, now: Instant) {
        self.consecutive_timeouts = 0;
        self.last_finished_at = now;
    }

    /// Records a finished command.
    ///
    /// Reaching the threshold resets the counter and returns
    /// [`Verdict::Reconnect`] once.
    pub(crate) fn record(&mut self, outcome: Outcome, now: Instant) -> Verdict {
        self.last_finished_at = now;

        if outcome != Outcome::Timeout {
            self.consecutive_timeouts = 0;
            return Verdict::Continue;
        }

        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts >= self.threshold {
            self.consecutive_timeouts = 0;
            return Verdict::Reconnect;
        }

        Verdict::Continue
    }

    /// Returns the current consecutive timeout count.
    #[inline]
    pub(crate) fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    /// Returns how long the link has been idle.
    #[inline]
    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_finished_at)
    }
}

// ============================================================================
// Tests
// ============================================================================
