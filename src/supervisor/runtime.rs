//! Supervisor event loop.
//!
//! One tokio task owns the link state, the command queue and the failure
//! counters. Everything that can change them arrives as a message:
//!
//! - Public commands from [`Supervisor`](super::Supervisor) handles
//! - Link signals and completions, tagged with their epoch
//! - Timer expiries, tagged with their epoch
//! - Queue dispatch steps
//! - Keepalive ticks
//!
//! Messages from an older epoch are dropped, so a closed link or a timer
//! that raced its cancellation can never touch the current attempt.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, JobId};
use crate::job::CommandJob;
use crate::link::{DeviceLink, LinkConfig, LinkOpener, LinkSignal, SignalSink, Timings};
use crate::resolver::DeviceResolver;

use super::core::FatalEvent;
use super::monitor::{FailureMonitor, Outcome, Verdict};
use super::queue::CommandQueue;
use super::state::{Confirmation, LinkState, LinkStatus};
use super::timers::{TimerKind, Timers};

// ============================================================================
// Messages
// ============================================================================

/// What a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompletionTarget {
    /// A queued job.
    Job(JobId),
    /// A keepalive probe.
    Probe,
}

/// Internal events for the event loop.
pub(crate) enum LoopEvent {
    /// Lifecycle signal from a device link.
    Signal { epoch: Epoch, signal: LinkSignal },
    /// A primitive finished.
    Completed {
        epoch: Epoch,
        target: CompletionTarget,
        result: Result<()>,
    },
    /// A timer fired.
    Timer { epoch: Epoch, timer: TimerKind },
    /// Try to dispatch the next queued job.
    Dispatch,
}

/// Commands from [`Supervisor`](super::Supervisor) handles.
pub(crate) enum SupervisorCommand {
    /// Open the link and run the handshake.
    Start(LinkConfig),
    /// Queue a job.
    Push(CommandJob),
    /// Stop the supervisor.
    Shutdown,
}

// ============================================================================
// Runtime
// ============================================================================

/// State owned by the supervisor task.
pub(crate) struct Runtime {
    /// Opens device links.
    opener: Arc<dyn LinkOpener>,
    /// Delays and thresholds.
    timings: Timings,
    /// Configuration stored by `start`, reused on reconnect.
    config: Option<LinkConfig>,
    /// Current link state.
    state: LinkState,
    /// Current epoch.
    epoch: Epoch,
    /// Link of the current epoch.
    link: Option<Arc<dyn DeviceLink>>,
    /// Command queue.
    queue: CommandQueue,
    /// Consecutive timeout policy.
    monitor: FailureMonitor,
    /// Armed timers.
    timers: Timers,
    /// Our own event channel, handed to links.
    events: mpsc::UnboundedSender<LoopEvent>,
    /// Status publisher.
    status: watch::Sender<LinkStatus>,
    /// Fatal event channel.
    fatal: mpsc::UnboundedSender<FatalEvent>,
    /// Set while a reconnect runs and during its grace period.
    reconnect_in_flight: bool,
    /// Init-complete was seen (or synthesized) in this epoch.
    init_complete: bool,
    /// The link reported an error or disconnect during this epoch's handshake.
    link_lost: bool,
    /// How the current epoch became operational.
    confirmation: Option<Confirmation>,
}

impl Runtime {
    /// Creates the runtime state.
    pub(crate) fn new(
        opener: Arc<dyn LinkOpener>,
        resolver: Arc<dyn DeviceResolver>,
        timings: Timings,
        events: mpsc::UnboundedSender<LoopEvent>,
        status: watch::Sender<LinkStatus>,
        fatal: mpsc::UnboundedSender<FatalEvent>,
    ) -> Self {
        Self {
            opener,
            timings,
            config: None,
            state: LinkState::Closed,
            epoch: Epoch::INITIAL,
            link: None,
            queue: CommandQueue::new(resolver, events.clone()),
            monitor: FailureMonitor::new(timings.timeout_threshold, Instant::now()),
            timers: Timers::new(events.clone()),
            events,
            status,
            fatal,
            reconnect_in_flight: false,
            init_complete: false,
            link_lost: false,
            confirmation: None,
        }
    }

    /// Runs the event loop until shutdown or until every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SupervisorCommand>,
        mut events: mpsc::UnboundedReceiver<LoopEvent>,
    ) {
        let mut keepalive: Option<Interval> = None;

        loop {
            tokio::select! {
                // Commands from Supervisor handles
                command = commands.recv() => {
                    match command {
                        Some(SupervisorCommand::Start(config)) => self.start(config),
                        Some(SupervisorCommand::Push(job)) => self.push(job),
                        Some(SupervisorCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }
                        None => {
                            debug!("All supervisor handles dropped");
                            break;
                        }
                    }
                }

                // Signals, completions, timers, dispatch steps
                Some(event) = events.recv() => self.handle_event(event),

                // Keepalive
                () = next_tick(&mut keepalive) => self.keepalive_tick(),
            }

            if keepalive.is_none() && self.queue.is_initialized() {
                let period = self.timings.keepalive_interval;
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                keepalive = Some(ticker);
                debug!(period_ms = period.as_millis() as u64, "Keepalive enabled");
            }

            self.publish_status();
        }

        self.shutdown(&mut commands);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Opens the first link.
    fn start(&mut self, config: LinkConfig) {
        if self.state != LinkState::Closed {
            warn!(state = %self.state, "Start ignored, supervisor already started");
            return;
        }

        self.config = Some(config);
        self.epoch = self.epoch.next();
        self.connect();
    }

    /// Routes a job to the queue.
    fn push(&mut self, job: CommandJob) {
        if self.state == LinkState::FatallyStopped {
            debug!(job_id = %job.id(), "Link stopped, refusing command");
            job.finish(Err(Error::link_unavailable(self.state)));
            return;
        }

        if let Some(outcome) = self.queue.push(job, self.state) {
            self.record(outcome);
        }
    }

    /// Closes the link and fails everything still pending.
    fn shutdown(&mut self, commands: &mut mpsc::UnboundedReceiver<SupervisorCommand>) {
        info!(epoch = %self.epoch, "Supervisor shutting down");

        self.timers.cancel_all();
        if self.state != LinkState::FatallyStopped {
            self.state = LinkState::Closed;
        }
        self.queue.detach(self.state);
        self.close_link();

        commands.close();
        while let Ok(command) = commands.try_recv() {
            if let SupervisorCommand::Push(job) = command {
                job.finish(Err(Error::link_unavailable(self.state)));
            }
        }

        self.publish_status();
        debug!("Supervisor event loop terminated");
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Handles one internal event.
    fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Dispatch => {
                if let Some(outcome) = self.queue.dispatch_next() {
                    self.record(outcome);
                }
            }

            LoopEvent::Signal { epoch, signal } => {
                if epoch != self.epoch {
                    debug!(%epoch, current = %self.epoch, signal = signal.name(), "Ignoring stale signal");
                    return;
                }
                self.handle_signal(signal);
            }

            LoopEvent::Completed {
                epoch,
                target,
                result,
            } => {
                if epoch != self.epoch {
                    debug!(%epoch, current = %self.epoch, ?target, "Ignoring stale completion");
                    return;
                }
                match target {
                    CompletionTarget::Job(job_id) => {
                        if let Some(outcome) = self.queue.complete(job_id, result) {
                            self.record(outcome);
                        }
                    }
                    CompletionTarget::Probe => self.queue.probe_done(result),
                }
            }

            LoopEvent::Timer { epoch, timer } => {
                if epoch != self.epoch {
                    debug!(%epoch, current = %self.epoch, ?timer, "Ignoring stale timer");
                    return;
                }
                self.timers.fired(timer);
                self.handle_timer(timer);
            }
        }
    }

    /// Drives the handshake from link signals.
    fn handle_signal(&mut self, signal: LinkSignal) {
        trace!(epoch = %self.epoch, state = %self.state, signal = signal.name(), "Link signal");

        match signal {
            LinkSignal::ConnectFailed { message } => {
                if self.state.is_handshaking() {
                    self.fatal(Error::handshake_failed(message));
                }
            }

            LinkSignal::HandshakeAck => {
                if matches!(
                    self.state,
                    LinkState::Connecting | LinkState::AwaitingHandshakeAck
                ) {
                    info!(epoch = %self.epoch, "Transceiver ready");
                    self.state = LinkState::AwaitingReceiverStarted;
                    self.timers
                        .arm(TimerKind::InitFallback, self.timings.init_fallback, self.epoch);
                    self.timers
                        .arm(TimerKind::ReadyFallback, self.timings.ready_fallback, self.epoch);
                }
            }

            LinkSignal::InitComplete => {
                if self.state.is_handshaking() {
                    debug!(epoch = %self.epoch, "Initialization complete");
                    self.init_complete = true;
                }
            }

            LinkSignal::ReceiverStarted => {
                if self.state.is_handshaking() && !self.link_lost {
                    self.enter_operational(Confirmation::ReceiverStarted);
                }
            }

            LinkSignal::Error { message } => self.link_failed(message),

            LinkSignal::Disconnect => self.link_failed("disconnected".to_string()),
        }
    }

    /// Handles an error or disconnect reported by the link.
    fn link_failed(&mut self, message: String) {
        match self.state {
            LinkState::Operational => {
                self.fatal(Error::operational_link_lost(message));
            }
            state if state.is_handshaking() && self.queue.is_initialized() => {
                self.fatal(Error::operational_link_lost(message));
            }
            state if state.is_handshaking() => {
                // Only the hard timer may end this handshake now.
                warn!(epoch = %self.epoch, error = %message, "Link error during handshake");
                self.link_lost = true;
                self.timers.cancel(TimerKind::InitFallback);
                self.timers.cancel(TimerKind::ReadyFallback);
            }
            state => {
                debug!(%state, error = %message, "Ignoring link error");
            }
        }
    }

    /// Handles a timer expiry of the current epoch.
    fn handle_timer(&mut self, timer: TimerKind) {
        match timer {
            TimerKind::InitTimeout => {
                if self.state.is_handshaking() {
                    let timeout_ms = self.timings.init_timeout.as_millis() as u64;
                    self.fatal(Error::handshake_timeout(timeout_ms));
                }
            }

            TimerKind::InitFallback => {
                if self.state == LinkState::AwaitingReceiverStarted && !self.init_complete {
                    warn!(epoch = %self.epoch, "Init-complete not seen, assuming initialized");
                    self.init_complete = true;
                }
            }

            TimerKind::ReadyFallback => {
                if self.state == LinkState::AwaitingReceiverStarted && !self.link_lost {
                    self.enter_operational(Confirmation::Degraded);
                }
            }

            TimerKind::Reconnect => {
                if self.state == LinkState::ReconnectScheduled {
                    info!(epoch = %self.epoch, "Reopening device link");
                    self.connect();
                }
            }

            TimerKind::ReconnectGrace => {
                debug!(epoch = %self.epoch, "Reconnect grace period over");
                self.reconnect_in_flight = false;
            }
        }
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    /// Opens a link for the current epoch.
    fn connect(&mut self) {
        let Some(config) = self.config.clone() else {
            warn!("Connect without stored configuration");
            return;
        };

        self.state = LinkState::Connecting;
        self.init_complete = false;
        self.link_lost = false;
        self.confirmation = None;
        self.timers
            .arm(TimerKind::InitTimeout, self.timings.init_timeout, self.epoch);
        self.publish_status();

        info!(epoch = %self.epoch, path = %config.path().display(), "Opening device link");

        let signals = SignalSink::new(self.epoch, self.events.clone());
        match self.opener.open(&config, signals) {
            Ok(link) => {
                self.link = Some(link);
                self.state = LinkState::AwaitingHandshakeAck;
            }
            Err(e) => self.fatal(Error::handshake_failed(e.to_string())),
        }
    }

    /// Makes the link usable.
    fn enter_operational(&mut self, confirmation: Confirmation) {
        let Some(link) = self.link.clone() else {
            warn!(epoch = %self.epoch, "No link to make operational");
            return;
        };

        self.timers.cancel(TimerKind::InitTimeout);
        self.timers.cancel(TimerKind::InitFallback);
        self.timers.cancel(TimerKind::ReadyFallback);

        self.state = LinkState::Operational;
        self.confirmation = Some(confirmation);
        self.monitor.reset(Instant::now());
        self.queue.attach(link, self.epoch);

        match confirmation {
            Confirmation::ReceiverStarted => {
                info!(epoch = %self.epoch, "Link operational");
            }
            Confirmation::Degraded => {
                warn!(
                    epoch = %self.epoch,
                    confirmation = "degraded",
                    "Receiver start not confirmed, forcing link operational"
                );
            }
        }

        if self.reconnect_in_flight {
            info!(epoch = %self.epoch, "Link re-established");
            self.timers
                .arm(TimerKind::ReconnectGrace, self.timings.reconnect_grace, self.epoch);
        }
    }

    // ========================================================================
    // Failure Handling
    // ========================================================================

    /// Feeds an outcome to the failure monitor.
    fn record(&mut self, outcome: Outcome) {
        let verdict = self.monitor.record(outcome, Instant::now());
        if outcome == Outcome::Timeout {
            debug!(
                consecutive = self.monitor.consecutive_timeouts(),
                "Command timeout recorded"
            );
        }

        if verdict == Verdict::Reconnect {
            self.schedule_reconnect();
        }
    }

    /// Tears the link down and arms the reconnect timer.
    fn schedule_reconnect(&mut self) {
        if self.state != LinkState::Operational || self.reconnect_in_flight {
            debug!(state = %self.state, "Reconnect already in flight");
            return;
        }

        warn!(
            epoch = %self.epoch,
            threshold = self.timings.timeout_threshold,
            "Transceiver stopped answering, reconnecting"
        );

        self.reconnect_in_flight = true;
        self.timers.cancel_all();
        self.state = LinkState::ReconnectScheduled;
        self.queue.detach(self.state);
        self.close_link();

        self.timers
            .arm(TimerKind::Reconnect, self.timings.reconnect_delay, self.epoch);
    }

    /// Stops the link for good and emits the fatal event.
    fn fatal(&mut self, error: Error) {
        if self.state == LinkState::FatallyStopped {
            return;
        }

        let epoch = self.epoch;
        error!(%epoch, error = %error, "Link fatally stopped");

        self.timers.cancel_all();
        self.state = LinkState::FatallyStopped;
        self.reconnect_in_flight = false;
        self.queue.detach(self.state);
        self.close_link();

        let _ = self.fatal.send(FatalEvent { error, epoch });
    }

    /// Closes the current link and moves to a new epoch.
    fn close_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.epoch = self.epoch.next();
    }

    // ========================================================================
    // Keepalive
    // ========================================================================

    /// Sends a status probe if the link has been idle long enough.
    fn keepalive_tick(&mut self) {
        if self.state != LinkState::Operational || self.reconnect_in_flight {
            trace!(state = %self.state, "Keepalive skipped, link not steady");
            return;
        }
        if self.queue.is_busy() {
            trace!("Keepalive skipped, link busy");
            return;
        }

        let idle = self.monitor.idle_for(Instant::now());
        if idle < self.timings.idle_threshold {
            trace!(idle_ms = idle.as_millis() as u64, "Keepalive skipped, link recently used");
            return;
        }

        self.queue.send_probe();
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Publishes the current snapshot if it changed.
    fn publish_status(&self) {
        let next = LinkStatus {
            state: self.state,
            epoch: self.epoch,
            queued: self.queue.len(),
            dispatching: self.queue.is_dispatching(),
            consecutive_timeouts: self.monitor.consecutive_timeouts(),
            reconnect_in_flight: self.reconnect_in_flight,
            init_complete: self.init_complete,
            confirmation: self.confirmation,
        };

        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Waits for the next keepalive tick, or forever while disabled.
async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}
