//! Link supervision.
//!
//! The supervisor owns the device link for the lifetime of the process. It
//! drives the initialization handshake, serializes commands onto the link,
//! reconnects after repeated timeouts and probes an idle link.
//!
//! # Handshake
//!
//! ```text
//! Closed ──start──► Connecting ──open──► AwaitingHandshakeAck
//!                                              │ ready
//!                                              ▼
//!                                  AwaitingReceiverStarted ──receiver started──► Operational
//!                                              │ ready fallback                       ▲
//!                                              └──────────── degraded ────────────────┘
//! ```
//!
//! Any state before `Operational` fails with a fatal event when the hard
//! init timer expires. A lost operational link is fatal too; only repeated
//! command timeouts lead to a reconnect.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SupervisorBuilder`] |
//! | `core` | [`Supervisor`] handle and [`FatalEvent`] |
//! | `state` | [`LinkState`] and [`LinkStatus`] |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for supervisor configuration.
pub mod builder;

/// Supervisor handle.
pub mod core;

/// Link state and status snapshot.
pub mod state;

/// Consecutive-timeout counting.
mod monitor;

/// Single-flight command queue.
mod queue;

/// Event loop.
pub(crate) mod runtime;

/// Named epoch-tagged timers.
mod timers;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SupervisorBuilder;
pub use core::{FatalEvent, FatalReceiver, Supervisor};
pub use state::{Confirmation, LinkState, LinkStatus};
