//! Link state and status snapshot.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::identifiers::Epoch;

// ============================================================================
// LinkState
// ============================================================================

/// State of the supervised link.
///
/// Only [`LinkState::FatallyStopped`] is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Not started.
    #[default]
    Closed,
    /// Opening the port.
    Connecting,
    /// Port open, waiting for the transceiver's "ready".
    AwaitingHandshakeAck,
    /// Ready received, waiting for the receiver to start.
    AwaitingReceiverStarted,
    /// Link usable; commands are dispatched.
    Operational,
    /// Torn down after repeated timeouts, waiting to reopen.
    ReconnectScheduled,
    /// Link could not be established or was lost; process must shut down.
    FatallyStopped,
}

impl LinkState {
    /// Returns `true` while the handshake of the current epoch is running.
    #[inline]
    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingHandshakeAck | Self::AwaitingReceiverStarted
        )
    }

    /// Returns the snake_case state name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::AwaitingHandshakeAck => "awaiting_handshake_ack",
            Self::AwaitingReceiverStarted => "awaiting_receiver_started",
            Self::Operational => "operational",
            Self::ReconnectScheduled => "reconnect_scheduled",
            Self::FatallyStopped => "fatally_stopped",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Confirmation
// ============================================================================

/// How the current epoch became operational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// The transceiver reported its receiver started.
    ReceiverStarted,
    /// The ready fallback expired without that report.
    Degraded,
}

// ============================================================================
// LinkStatus
// ============================================================================

/// Point-in-time snapshot of the supervisor, for health reporting.
///
/// # Format
///
/// ```json
/// {
///   "state": "operational",
///   "epoch": 1,
///   "queued": 0,
///   "dispatching": false,
///   "consecutive_timeouts": 0,
///   "reconnect_in_flight": false,
///   "init_complete": true,
///   "confirmation": "receiver_started"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LinkStatus {
    /// Current link state.
    pub state: LinkState,
    /// Current epoch.
    pub epoch: Epoch,
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// A job is in flight.
    pub dispatching: bool,
    /// Consecutive command timeouts so far.
    pub consecutive_timeouts: u32,
    /// A reconnect is running or in its grace period.
    pub reconnect_in_flight: bool,
    /// Init-complete was reported, or assumed after its fallback, in this epoch.
    pub init_complete: bool,
    /// How the current epoch became operational, if it has.
    pub confirmation: Option<Confirmation>,
}

impl LinkStatus {
    /// Returns `true` if commands are being dispatched.
    #[inline]
    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.state == LinkState::Operational
    }
}

// ============================================================================
// Tests
// ============================================================================
