//! Device link boundary.
//!
//! This module defines the capability the supervisor drives: an opened
//! transceiver connection that emits lifecycle signals and executes one
//! primitive at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                        ┌─────────────────┐
//! │  Supervisor runtime  │   send(primitive) ───► │   DeviceLink    │
//! │  (single tokio task) │                        │  (serial port)  │
//! │                      │ ◄─── Completion        │                 │
//! │                      │ ◄─── SignalSink        │                 │
//! └──────────────────────┘                        └─────────────────┘
//! ```
//!
//! # Link Lifecycle
//!
//! 1. `LinkOpener::open` - Open the port and begin initialization
//! 2. `LinkSignal::HandshakeAck` - Transceiver answered the reset ("ready")
//! 3. `LinkSignal::InitComplete` - Initialization callback fired
//! 4. `LinkSignal::ReceiverStarted` - Receiver armed, link usable
//! 5. `DeviceLink::send` - One primitive at a time
//! 6. `DeviceLink::close` - Teardown for reconnect or shutdown
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | Link and timing configuration |
//! | `device` | `DeviceLink`, `LinkOpener`, signals and completions |

// ============================================================================
// Submodules
// ============================================================================

/// Link and timing configuration.
pub mod config;

/// Device link traits, signals and completions.
pub mod device;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{LinkConfig, Timings};
pub use device::{Completion, DeviceLink, LinkOpener, LinkSignal, SignalSink};
