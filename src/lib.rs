//! rfxlink - Link supervisor for RFXCOM-style serial radio transceivers.
//!
//! This library keeps a single half-duplex 433 MHz transceiver usable for a
//! long-running bridge process: it runs the transceiver's initialization
//! handshake, serializes commands onto it one at a time, and recovers when
//! the transceiver silently stops answering.
//!
//! # Architecture
//!
//! The supervisor follows a single-owner model:
//!
//! - **Supervisor task**: owns the link state, the command queue and the
//!   failure counters; every input is a message on its channels
//! - **Device link**: the serial driver, injected through [`LinkOpener`]
//!   and [`DeviceLink`]; reports progress through [`SignalSink`]
//!
//! Key design principles:
//!
//! - At most one primitive is ever in flight on the link
//! - Every signal, completion and timer is tagged with its [`Epoch`]
//! - Handshake fallbacks converge on firmware that skips signals
//! - Repeated timeouts reconnect; a lost operational link is fatal
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use rfxlink::{Action, Addressing, CommandJob, DeviceTable, Family, LinkConfig, Result, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let table = Arc::new(DeviceTable::new());
//!     table.insert("ARC_A_1", Addressing::remote_code('A', 1)?)?;
//!
//!     let (supervisor, mut fatal) = Supervisor::builder()
//!         .opener(Arc::new(SerialOpener::default()))
//!         .resolver(table)
//!         .spawn()?;
//!
//!     supervisor.start(LinkConfig::from_env())?;
//!     supervisor.wait_operational().await?;
//!
//!     let (job, outcome) = CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::Open);
//!     supervisor.push(job)?;
//!     outcome.await??;
//!
//!     if let Some(event) = fatal.recv().await {
//!         eprintln!("Link lost: {event}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Job ids, epochs and device references |
//! | [`job`] | [`CommandJob`] and outcome callbacks |
//! | [`link`] | Device link boundary and configuration |
//! | [`protocol`] | Device families and transceiver primitives |
//! | [`resolver`] | Device resolution and [`DeviceTable`] |
//! | [`supervisor`] | [`Supervisor`], its builder and status |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing job ids and epochs at compile time.
pub mod identifiers;

/// Command jobs and their outcome callbacks.
pub mod job;

/// Device link boundary.
///
/// Traits the serial driver implements, plus link and timing configuration.
pub mod link;

/// Device families and transceiver primitives.
pub mod protocol;

/// Device resolution.
pub mod resolver;

/// Link supervision.
///
/// Use [`Supervisor::builder()`] to create a configured supervisor.
pub mod supervisor;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{DeviceRef, Epoch, JobId};

// Job types
pub use job::{CommandJob, OutcomeCallback, SuccessCallback};

// Link types
pub use link::{
    Completion, DeviceLink, LinkConfig, LinkOpener, LinkSignal, SignalSink, Timings,
};

// Protocol types
pub use protocol::{Action, Addressing, Family, Primitive};

// Resolver types
pub use resolver::{DeviceResolver, DeviceTable};

// Supervisor types
pub use supervisor::{
    Confirmation, FatalEvent, FatalReceiver, LinkState, LinkStatus, Supervisor, SupervisorBuilder,
};
