//! Supervisor handle.
//!
//! A [`Supervisor`] is a cheap, cloneable front for the event loop task.
//! Every method is non-blocking; requests are forwarded over a channel and
//! state is read from a `watch` snapshot.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::Epoch;
use crate::job::CommandJob;
use crate::link::LinkConfig;

use super::builder::SupervisorBuilder;
use super::runtime::SupervisorCommand;
use super::state::{LinkState, LinkStatus};

// ============================================================================
// FatalEvent
// ============================================================================

/// The link was lost for good; the host should shut down.
///
/// Emitted at most once per supervisor.
#[derive(Debug)]
pub struct FatalEvent {
    /// Why the link stopped.
    pub error: Error,
    /// Epoch the failure happened in.
    pub epoch: Epoch,
}

impl fmt::Display for FatalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (epoch {})", self.error, self.epoch)
    }
}

/// Receiving side of the fatal event channel.
pub type FatalReceiver = mpsc::UnboundedReceiver<FatalEvent>;

// ============================================================================
// Supervisor
// ============================================================================

/// Handle to the link supervisor.
///
/// # Thread Safety
///
/// `Supervisor` is `Send + Sync` and cheap to clone. The event loop stops
/// when [`Supervisor::shutdown`] is called or the last handle is dropped.
///
/// # Example
///
/// ```ignore
/// let (supervisor, mut fatal) = Supervisor::builder()
///     .opener(opener)
///     .resolver(table)
///     .spawn()?;
///
/// supervisor.start(LinkConfig::from_env())?;
/// supervisor.wait_operational().await?;
///
/// let (job, outcome) = CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::On);
/// supervisor.push(job)?;
/// outcome.await??;
/// ```
#[derive(Clone)]
pub struct Supervisor {
    /// Shared inner state.
    inner: Arc<SupervisorInner>,
}

/// Internal shared state.
struct SupervisorInner {
    /// Channel to the event loop.
    command_tx: mpsc::UnboundedSender<SupervisorCommand>,
    /// Latest published status.
    status_rx: watch::Receiver<LinkStatus>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("status", &*self.inner.status_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Creates a new supervisor builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Wraps the channels of a spawned event loop.
    pub(crate) fn new(
        command_tx: mpsc::UnboundedSender<SupervisorCommand>,
        status_rx: watch::Receiver<LinkStatus>,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                command_tx,
                status_rx,
            }),
        }
    }

    /// Opens the link and starts the handshake.
    ///
    /// Returns once the request is queued; progress is visible through
    /// [`Supervisor::status`]. A second `start` is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::SupervisorClosed`] if the event loop has stopped
    pub fn start(&self, config: LinkConfig) -> Result<()> {
        config.validate()?;
        self.inner
            .command_tx
            .send(SupervisorCommand::Start(config))
            .map_err(|_| Error::SupervisorClosed)
    }

    /// Submits a command job.
    ///
    /// Never blocks. Before the link has first become operational the job
    /// is logged and dropped without an outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SupervisorClosed`] if the event loop has stopped; the
    /// job's outcome callback then receives [`Error::LinkUnavailable`].
    pub fn push(&self, job: CommandJob) -> Result<()> {
        match self.inner.command_tx.send(SupervisorCommand::Push(job)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(command)) => {
                if let SupervisorCommand::Push(job) = command {
                    debug!(job_id = %job.id(), "Supervisor closed, refusing command");
                    job.finish(Err(Error::link_unavailable(LinkState::Closed)));
                }
                Err(Error::SupervisorClosed)
            }
        }
    }

    /// Returns `true` if commands are being dispatched.
    #[inline]
    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.inner.status_rx.borrow().is_operational()
    }

    /// Returns the latest status snapshot.
    #[inline]
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        self.inner.status_rx.borrow().clone()
    }

    /// Returns a receiver notified on every status change.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.inner.status_rx.clone()
    }

    /// Waits until the link is operational.
    ///
    /// # Errors
    ///
    /// - [`Error::LinkUnavailable`] if the link stopped for good first
    /// - [`Error::SupervisorClosed`] if the event loop stopped first
    pub async fn wait_operational(&self) -> Result<()> {
        let mut status_rx = self.subscribe();
        let status = status_rx
            .wait_for(|status| {
                status.is_operational() || status.state == LinkState::FatallyStopped
            })
            .await
            .map_err(|_| Error::SupervisorClosed)?;

        if status.is_operational() {
            Ok(())
        } else {
            Err(Error::link_unavailable(status.state))
        }
    }

    /// Stops the event loop, closing the link and failing pending jobs.
    pub fn shutdown(&self) {
        let _ = self.inner.command_tx.send(SupervisorCommand::Shutdown);
    }
}

// ============================================================================
// Tests
// ============================================================================
