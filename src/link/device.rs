//! Device link traits, signals and completions.
//!
//! Everything a link implementation reports back (lifecycle signals and
//! command completions) is tagged with the epoch it was opened in and
//! marshalled onto the supervisor's task through an unbounded channel, so
//! link callbacks may fire from any thread.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, JobId};
use crate::protocol::Primitive;
use crate::supervisor::runtime::{CompletionTarget, LoopEvent};

use super::config::LinkConfig;

// ============================================================================
// LinkSignal
// ============================================================================

/// Lifecycle signal emitted by a device link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSignal {
    /// The port could not be opened or configured.
    ConnectFailed {
        /// Driver error message.
        message: String,
    },
    /// The transceiver acknowledged the reset ("ready").
    HandshakeAck,
    /// The driver's initialization callback fired.
    InitComplete,
    /// The receiver is armed and the link accepts commands.
    ReceiverStarted,
    /// The driver reported an error.
    Error {
        /// Driver error message.
        message: String,
    },
    /// The port closed.
    Disconnect,
}

impl LinkSignal {
    /// Returns the signal name for logging.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectFailed { .. } => "connect_failed",
            Self::HandshakeAck => "handshake_ack",
            Self::InitComplete => "init_complete",
            Self::ReceiverStarted => "receiver_started",
            Self::Error { .. } => "error",
            Self::Disconnect => "disconnect",
        }
    }
}

// ============================================================================
// SignalSink
// ============================================================================

/// Channel a device link uses to report lifecycle signals.
///
/// Handed to [`LinkOpener::open`]. Cloneable and usable from any thread.
#[derive(Clone)]
pub struct SignalSink {
    /// Epoch the link was opened in.
    epoch: Epoch,
    /// Supervisor event channel.
    events: mpsc::UnboundedSender<LoopEvent>,
}

impl SignalSink {
    /// Creates a sink bound to an epoch.
    pub(crate) fn new(epoch: Epoch, events: mpsc::UnboundedSender<LoopEvent>) -> Self {
        Self { epoch, events }
    }

    /// Returns the epoch this sink reports for.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Reports a signal to the supervisor.
    ///
    /// Returns `false` if the supervisor has stopped.
    pub fn emit(&self, signal: LinkSignal) -> bool {
        trace!(epoch = %self.epoch, signal = signal.name(), "Link signal emitted");
        self.events
            .send(LoopEvent::Signal {
                epoch: self.epoch,
                signal,
            })
            .is_ok()
    }
}

impl fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Completion handle for one primitive.
///
/// The link must call [`Completion::complete`] once the transceiver has
/// answered (or its own per-command timeout expired, reported as
/// [`Error::CommandTimeout`]). A completion dropped without being completed
/// reports a [`Error::CommandFailed`] so the queue can never stall.
pub struct Completion {
    /// Epoch the primitive was sent in.
    epoch: Epoch,
    /// What the primitive belongs to.
    target: CompletionTarget,
    /// Supervisor event channel (taken on completion).
    events: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl Completion {
    /// Creates a completion for a queued job.
    pub(crate) fn job(
        epoch: Epoch,
        job_id: JobId,
        events: mpsc::UnboundedSender<LoopEvent>,
    ) -> Self {
        Self {
            epoch,
            target: CompletionTarget::Job(job_id),
            events: Some(events),
        }
    }

    /// Creates a completion for a keepalive probe.
    pub(crate) fn probe(epoch: Epoch, events: mpsc::UnboundedSender<LoopEvent>) -> Self {
        Self {
            epoch,
            target: CompletionTarget::Probe,
            events: Some(events),
        }
    }

    /// Reports the primitive's outcome.
    pub fn complete(mut self, result: Result<()>) {
        self.deliver(result);
    }

    /// Sends the outcome to the supervisor, at most once.
    fn deliver(&mut self, result: Result<()>) {
        if let Some(events) = self.events.take() {
            let _ = events.send(LoopEvent::Completed {
                epoch: self.epoch,
                target: self.target,
                result,
            });
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.events.is_some() {
            warn!(epoch = %self.epoch, target = ?self.target, "Completion dropped without outcome");
            self.deliver(Err(Error::command_failed("completion dropped by device link")));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("epoch", &self.epoch)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DeviceLink
// ============================================================================

/// An opened transceiver connection.
///
/// # Contract
///
/// - `send` must not block; the outcome arrives through the completion.
/// - A synchronous `Err` from `send` is that primitive's outcome; the
///   completion may then be dropped.
/// - The supervisor never has two primitives in flight.
pub trait DeviceLink: Send + Sync {
    /// Transmits one primitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the primitive could not be handed to the driver.
    fn send(&self, primitive: Primitive, completion: Completion) -> Result<()>;

    /// Closes the connection. Signals emitted afterwards are ignored.
    fn close(&self);
}

// ============================================================================
// LinkOpener
// ============================================================================

/// Opens device links.
///
/// `open` returns as soon as the port is open and initialization has been
/// started; handshake progress is reported through `signals`.
pub trait LinkOpener: Send + Sync {
    /// Opens a link and starts its initialization sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened; the supervisor treats
    /// it as a failed connect.
    fn open(&self, config: &LinkConfig, signals: SignalSink) -> Result<Arc<dyn DeviceLink>>;
}

// ============================================================================
// Tests
// ============================================================================
