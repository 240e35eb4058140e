//! Error types for the link supervisor.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Job outcomes and fallible setup calls use [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use rfxlink::{CommandJob, Result};
//!
//! async fn example(supervisor: &Supervisor, job: CommandJob) -> Result<()> {
//!     supervisor.push(job)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Job | [`Error::DeviceNotFound`], [`Error::CommandTimeout`], [`Error::CommandFailed`], [`Error::LinkUnavailable`] |
//! | Link (fatal) | [`Error::HandshakeTimeout`], [`Error::HandshakeFailed`], [`Error::OperationalLinkLost`] |
//! | Misuse | [`Error::QueueNotInitialized`], [`Error::SupervisorClosed`] |
//! | Configuration | [`Error::Config`] |
//! | Input | [`Error::InvalidAddress`], [`Error::InvalidAction`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::DeviceRef;
use crate::supervisor::LinkState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Job-level variants are handed back through a job's outcome callback.
/// Link-level variants only ever leave the supervisor as a
/// [`FatalEvent`](crate::FatalEvent).
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when supervisor or link configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Device addressing fields are out of range.
    #[error("Invalid address: {message}")]
    InvalidAddress {
        /// Description of the invalid field.
        message: String,
    },

    /// A command payload is not a known action.
    #[error("Invalid action: {action:?}")]
    InvalidAction {
        /// The payload as received.
        action: String,
    },

    // ========================================================================
    // Job Errors
    // ========================================================================
    /// Target device could not be resolved.
    ///
    /// Never counted as a link failure.
    #[error("Device not found: {device}")]
    DeviceNotFound {
        /// The unresolved device reference.
        device: DeviceRef,
    },

    /// The transceiver did not answer a command in time.
    ///
    /// Reported by the device link; feeds the failure monitor.
    #[error("Command timed out: {command}")]
    CommandTimeout {
        /// Primitive that timed out.
        command: String,
    },

    /// The transceiver reported a non-timeout error.
    #[error("Command failed: {message}")]
    CommandFailed {
        /// Error reported by the device link.
        message: String,
    },

    /// The link is not in a state that accepts commands.
    #[error("Link unavailable ({state})")]
    LinkUnavailable {
        /// Link state at the time the job was refused.
        state: LinkState,
    },

    /// A command was submitted before the link was ever operational.
    ///
    /// Logged and dropped, never returned to the caller.
    #[error("Command queue not initialized")]
    QueueNotInitialized,

    // ========================================================================
    // Link Errors
    // ========================================================================
    /// Initialization did not reach an operational link in time.
    #[error("Handshake timeout after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The device link could not be opened.
    #[error("Handshake failed: {message}")]
    HandshakeFailed {
        /// Description of the failure.
        message: String,
    },

    /// An operational link reported an error or disconnected.
    #[error("Operational link lost: {message}")]
    OperationalLinkLost {
        /// Description of the loss.
        message: String,
    },

    /// Supervisor runtime has stopped.
    #[error("Supervisor closed")]
    SupervisorClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    /// Creates an invalid action error.
    #[inline]
    pub fn invalid_action(action: impl Into<String>) -> Self {
        Self::InvalidAction {
            action: action.into(),
        }
    }

    /// Creates a device not found error.
    #[inline]
    pub fn device_not_found(device: impl Into<DeviceRef>) -> Self {
        Self::DeviceNotFound {
            device: device.into(),
        }
    }

    /// Creates a command timeout error.
    #[inline]
    pub fn command_timeout(command: impl Into<String>) -> Self {
        Self::CommandTimeout {
            command: command.into(),
        }
    }

    /// Creates a command failed error.
    #[inline]
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::CommandFailed {
            message: message.into(),
        }
    }

    /// Creates a link unavailable error.
    #[inline]
    pub fn link_unavailable(state: LinkState) -> Self {
        Self::LinkUnavailable { state }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a handshake failed error.
    #[inline]
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            message: message.into(),
        }
    }

    /// Creates an operational link lost error.
    #[inline]
    pub fn operational_link_lost(message: impl Into<String>) -> Self {
        Self::OperationalLinkLost {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a command timeout.
    ///
    /// Only these outcomes advance the consecutive timeout counter.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CommandTimeout { .. })
    }

    /// Returns `true` if this error requires process shutdown.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout { .. }
                | Self::HandshakeFailed { .. }
                | Self::OperationalLinkLost { .. }
        )
    }

    /// Returns `true` if this error is reported through a job outcome.
    #[inline]
    #[must_use]
    pub fn is_job_level(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::CommandTimeout { .. }
                | Self::CommandFailed { .. }
                | Self::LinkUnavailable { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::device_not_found("ARC_A_1");
        assert_eq!(err.to_string(), "Device not found: ARC_A_1");

        let err = Error::link_unavailable(LinkState::ReconnectScheduled);
        assert_eq!(err.to_string(), "Link unavailable (reconnect_scheduled)");

        let err = Error::invalid_action("toggle");
        assert_eq!(err.to_string(), "Invalid action: \"toggle\"");
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::command_timeout("switch-up A1").is_timeout());
        assert!(!Error::command_failed("nack").is_timeout());
        assert!(!Error::handshake_timeout(30_000).is_timeout());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::handshake_timeout(30_000).is_fatal());
        assert!(Error::handshake_failed("no such port").is_fatal());
        assert!(Error::operational_link_lost("disconnect").is_fatal());
        assert!(!Error::command_timeout("stop A1").is_fatal());
        assert!(!Error::QueueNotInitialized.is_fatal());
    }

    #[test]
    fn test_is_job_level() {
        assert!(Error::device_not_found("x").is_job_level());
        assert!(Error::link_unavailable(LinkState::Closed).is_job_level());
        assert!(!Error::SupervisorClosed.is_job_level());
        assert!(!Error::config("bad").is_job_level());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "no such device");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
