//! Link and timing configuration.
//!
//! [`LinkConfig`] says which port to open. [`Timings`] holds every delay the
//! supervisor owns; the defaults match transceiver firmware observed in the
//! field and rarely need changing outside of tests.
//!
//! # Example
//!
//! ```ignore
//! use rfxlink::LinkConfig;
//!
//! let config = LinkConfig::new("/dev/ttyUSB0").with_debug();
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Serial port used when `SERIAL_PORT` is unset.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Environment variable naming the serial port.
const SERIAL_PORT_ENV: &str = "SERIAL_PORT";

/// Environment variable holding the bridge log level.
const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

// ============================================================================
// LinkConfig
// ============================================================================

/// Where and how to open the transceiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Serial device path.
    pub path: PathBuf,

    /// Enable the driver's own frame-level debug output.
    #[serde(default)]
    pub debug: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERIAL_PORT)
    }
}

impl LinkConfig {
    /// Creates a configuration for the given serial device.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            debug: false,
        }
    }

    /// Reads `SERIAL_PORT` and `LOG_LEVEL` from the environment.
    ///
    /// `LOG_LEVEL=debug` turns on driver debug output.
    #[must_use]
    pub fn from_env() -> Self {
        let path = env::var(SERIAL_PORT_ENV).unwrap_or_else(|_| DEFAULT_SERIAL_PORT.to_string());
        let debug = env::var(LOG_LEVEL_ENV)
            .map(|level| level.eq_ignore_ascii_case("debug"))
            .unwrap_or(false);

        Self {
            path: PathBuf::from(path),
            debug,
        }
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed input and [`Error::Config`] if
    /// the result fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Enables driver debug output.
    #[inline]
    #[must_use]
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Returns the serial device path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path is empty.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::config("Serial port path must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Timings
// ============================================================================

/// Every delay and threshold owned by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Hard limit for reaching an operational link after `start`.
    pub init_timeout: Duration,

    /// After the handshake ack, synthesize init-complete if it never fired.
    pub init_fallback: Duration,

    /// After the handshake ack, force the link usable if the receiver never
    /// reported started.
    pub ready_fallback: Duration,

    /// Delay between teardown and reopen on reconnect.
    pub reconnect_delay: Duration,

    /// Extra time a reconnect stays "in flight" after the new link is up.
    pub reconnect_grace: Duration,

    /// Keepalive tick period.
    pub keepalive_interval: Duration,

    /// Minimum time since the last command before a keepalive probe.
    pub idle_threshold: Duration,

    /// Consecutive command timeouts that trigger a reconnect.
    pub timeout_threshold: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(30),
            init_fallback: Duration::from_secs(3),
            ready_fallback: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(3),
            reconnect_grace: Duration::from_secs(20),
            keepalive_interval: Duration::from_secs(12),
            idle_threshold: Duration::from_secs(10),
            timeout_threshold: 5,
        }
    }
}

impl Timings {
    /// Validates the timings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a delay is zero, the threshold is zero,
    /// or the handshake fallbacks are not ordered
    /// `init_fallback <= ready_fallback <= init_timeout`.
    pub fn validate(&self) -> Result<()> {
        let delays = [
            ("init_timeout", self.init_timeout),
            ("init_fallback", self.init_fallback),
            ("ready_fallback", self.ready_fallback),
            ("reconnect_delay", self.reconnect_delay),
            ("keepalive_interval", self.keepalive_interval),
        ];
        if let Some((name, _)) = delays.iter().find(|(_, delay)| delay.is_zero()) {
            return Err(Error::config(format!("{name} must be greater than zero")));
        }

        if self.timeout_threshold == 0 {
            return Err(Error::config("timeout_threshold must be at least 1"));
        }

        if self.init_fallback > self.ready_fallback || self.ready_fallback > self.init_timeout {
            return Err(Error::config(
                "Handshake fallbacks must satisfy init_fallback <= ready_fallback <= init_timeout",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
