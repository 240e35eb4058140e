//! Named, cancellable timers owned by the supervisor.
//!
//! Each armed timer is a spawned sleep that posts [`LoopEvent::Timer`] back
//! to the supervisor, tagged with the epoch it was armed in. Cancelling
//! aborts the sleep; the epoch tag covers the race where a timer fires
//! just before it is cancelled.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::trace;

use crate::identifiers::Epoch;

use super::runtime::LoopEvent;

// ============================================================================
// TimerKind
// ============================================================================

/// The supervisor's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    /// Hard limit for the whole handshake.
    InitTimeout,
    /// Synthesize init-complete (fallback A).
    InitFallback,
    /// Force the link usable (fallback B).
    ReadyFallback,
    /// Reopen after a reconnect teardown.
    Reconnect,
    /// Release the reconnect-in-flight flag.
    ReconnectGrace,
}

// ============================================================================
// Timers
// ============================================================================

/// Armed timers by kind.
pub(crate) struct Timers {
    /// Abort handles of armed timers.
    armed: FxHashMap<TimerKind, AbortHandle>,
    /// Supervisor event channel.
    events: mpsc::UnboundedSender<LoopEvent>,
}

impl Timers {
    /// Creates an empty timer set.
    pub(crate) fn new(events: mpsc::UnboundedSender<LoopEvent>) -> Self {
        Self {
            armed: FxHashMap::default(),
            events,
        }
    }

    /// Arms `kind` to fire after `delay`, replacing any armed instance.
    pub(crate) fn arm(&mut self, kind: TimerKind, delay: Duration, epoch: Epoch) {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(LoopEvent::Timer { epoch, timer: kind });
        })
        .abort_handle();

        trace!(?kind, ?delay, %epoch, "Timer armed");

        if let Some(previous) = self.armed.insert(kind, handle) {
            previous.abort();
        }
    }

    /// Marks `kind` as fired so a later cancel is a no-op.
    pub(crate) fn fired(&mut self, kind: TimerKind) {
        self.armed.remove(&kind);
    }

    /// Cancels `kind` if armed.
    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.armed.remove(&kind) {
            handle.abort();
            trace!(?kind, "Timer cancelled");
        }
    }

    /// Cancels every armed timer.
    pub(crate) fn cancel_all(&mut self) {
        for (_, handle) in self.armed.drain() {
            handle.abort();
        }
    }

    /// Returns `true` if `kind` is armed.
    #[cfg(test)]
    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// ============================================================================
// Tests
// ============================================================================
