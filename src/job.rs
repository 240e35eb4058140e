//! Command jobs submitted to the supervisor.
//!
//! A [`CommandJob`] names a device, the family the caller expects it to
//! belong to, and the action to perform. Its outcome is delivered through a
//! callback, either supplied directly or wired to a oneshot channel with
//! [`CommandJob::with_channel`].
//!
//! # Example
//!
//! ```ignore
//! use rfxlink::{Action, CommandJob, Family};
//!
//! let (job, outcome) = CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::Open);
//! supervisor.push(job)?;
//! outcome.await??;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::oneshot;
use tracing::error;

use crate::error::Result;
use crate::identifiers::{DeviceRef, JobId};
use crate::protocol::{Action, Family};

// ============================================================================
// Types
// ============================================================================

/// Outcome callback, invoked exactly once with the job's result.
pub type OutcomeCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Success callback, invoked after the outcome callback when the job succeeded.
pub type SuccessCallback = Box<dyn FnOnce() + Send + 'static>;

// ============================================================================
// CommandJob
// ============================================================================

/// One logical command awaiting transmission.
pub struct CommandJob {
    /// Unique job id.
    id: JobId,
    /// Family the target is expected to belong to.
    family: Family,
    /// Target device.
    target: DeviceRef,
    /// Requested action.
    action: Action,
    /// Outcome callback.
    on_outcome: OutcomeCallback,
    /// Optional success callback (e.g. publish MQTT state).
    on_success: Option<SuccessCallback>,
}

impl CommandJob {
    /// Creates a job with an outcome callback.
    #[must_use]
    pub fn new(
        family: Family,
        target: impl Into<DeviceRef>,
        action: Action,
        on_outcome: impl FnOnce(Result<()>) + Send + 'static,
    ) -> Self {
        Self {
            id: JobId::next(),
            family,
            target: target.into(),
            action,
            on_outcome: Box::new(on_outcome),
            on_success: None,
        }
    }

    /// Creates a job whose outcome is delivered on a oneshot channel.
    ///
    /// If the job is dropped without an outcome (queue not yet initialized)
    /// the receiver resolves to a `RecvError`.
    #[must_use]
    pub fn with_channel(
        family: Family,
        target: impl Into<DeviceRef>,
        action: Action,
    ) -> (Self, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        let job = Self::new(family, target, action, move |result| {
            let _ = tx.send(result);
        });
        (job, rx)
    }

    /// Attaches a callback run only when the command succeeds.
    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Returns the job id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Returns the expected family.
    #[inline]
    #[must_use]
    pub fn family(&self) -> Family {
        self.family
    }

    /// Returns the target device.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &DeviceRef {
        &self.target
    }

    /// Returns the requested action.
    #[inline]
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Delivers the outcome, consuming the job.
    ///
    /// A panicking callback is logged and swallowed so it cannot take the
    /// supervisor runtime down with it.
    pub(crate) fn finish(self, result: Result<()>) {
        let Self {
            id,
            on_outcome,
            on_success,
            ..
        } = self;
        let succeeded = result.is_ok();

        if catch_unwind(AssertUnwindSafe(|| on_outcome(result))).is_err() {
            error!(job_id = %id, "Outcome callback panicked");
        }

        if succeeded
            && let Some(on_success) = on_success
            && catch_unwind(AssertUnwindSafe(on_success)).is_err()
        {
            error!(job_id = %id, "Success callback panicked");
        }
    }
}

impl fmt::Debug for CommandJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandJob")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("target", &self.target)
            .field("action", &self.action)
            .field("on_success", &self.on_success.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
