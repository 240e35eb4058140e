//! Device families and transceiver primitives.
//!
//! This module defines how a logical action on a registered device maps to
//! the one primitive the transceiver understands.
//!
//! # Families
//!
//! | Family | Addressing | Primitives |
//! |--------|------------|------------|
//! | `RemoteCode` | house code + unit code | `switch-up`, `switch-down`, `stop` |
//! | `AddressableSwitch` | hex device id + unit code | `switch-on`, `switch-off` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `family` | [`Family`] and [`Addressing`] |
//! | `command` | [`Action`] and [`Primitive`] mapping |

// ============================================================================
// Submodules
// ============================================================================

/// Actions and transceiver primitives.
pub mod command;

/// Device families and their addressing fields.
pub mod family;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Action, Primitive};
pub use family::{Addressing, Family};
