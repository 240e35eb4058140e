//! Builder pattern for supervisor configuration.
//!
//! Provides a fluent API for wiring a [`Supervisor`] to its collaborators.
//!
//! # Example
//!
//! ```ignore
//! use rfxlink::{DeviceTable, Supervisor, Timings};
//!
//! let table = Arc::new(DeviceTable::new());
//! let (supervisor, fatal) = Supervisor::builder()
//!     .opener(Arc::new(SerialOpener::default()))
//!     .resolver(table.clone())
//!     .timings(Timings::default())
//!     .spawn()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::link::{LinkOpener, Timings};
use crate::resolver::DeviceResolver;

use super::core::{FatalReceiver, Supervisor};
use super::runtime::Runtime;
use super::state::LinkStatus;

// ============================================================================
// SupervisorBuilder
// ============================================================================

/// Builder for configuring a [`Supervisor`].
///
/// Use [`Supervisor::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct SupervisorBuilder {
    /// Opens device links.
    opener: Option<Arc<dyn LinkOpener>>,
    /// Resolves device references.
    resolver: Option<Arc<dyn DeviceResolver>>,
    /// Delays and thresholds.
    timings: Timings,
}

impl fmt::Debug for SupervisorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorBuilder")
            .field("opener", &self.opener.is_some())
            .field("resolver", &self.resolver.is_some())
            .field("timings", &self.timings)
            .finish()
    }
}

// ============================================================================
// SupervisorBuilder Implementation
// ============================================================================

impl SupervisorBuilder {
    /// Creates a new builder with default timings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the link opener.
    #[inline]
    #[must_use]
    pub fn opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Sets the device resolver.
    #[inline]
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn DeviceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Overrides the default timings.
    #[inline]
    #[must_use]
    pub fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Spawns the event loop on the current tokio runtime.
    ///
    /// Returns the handle and the receiver for the fatal event.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the opener or resolver is missing
    /// - [`Error::Config`] if the timings are invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn spawn(self) -> Result<(Supervisor, FatalReceiver)> {
        let opener = self.validate_opener()?;
        let resolver = self.validate_resolver()?;
        self.timings.validate()?;

        let handle = Handle::try_current().map_err(|_| {
            Error::config("Supervisor must be spawned from within a tokio runtime")
        })?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();

        let runtime = Runtime::new(
            opener,
            resolver,
            self.timings,
            event_tx,
            status_tx,
            fatal_tx,
        );
        handle.spawn(runtime.run(command_rx, event_rx));

        debug!(timings = ?self.timings, "Supervisor spawned");

        Ok((Supervisor::new(command_tx, status_rx), fatal_rx))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SupervisorBuilder {
    /// Validates the opener configuration.
    fn validate_opener(&self) -> Result<Arc<dyn LinkOpener>> {
        self.opener.clone().ok_or_else(|| {
            Error::config(
                "Link opener is required. Use .opener() to set it.\n\
                 Example: Supervisor::builder().opener(Arc::new(SerialOpener::default()))",
            )
        })
    }

    /// Validates the resolver configuration.
    fn validate_resolver(&self) -> Result<Arc<dyn DeviceResolver>> {
        self.resolver.clone().ok_or_else(|| {
            Error::config(
                "Device resolver is required. Use .resolver() to set it.\n\
                 Example: Supervisor::builder().resolver(Arc::new(DeviceTable::new()))",
            )
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
