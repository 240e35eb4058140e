//! Single-flight command queue.
//!
//! Jobs are dispatched in strict FIFO order with at most one primitive in
//! flight. Every dispatch step after the first is posted back to the
//! supervisor as [`LoopEvent::Dispatch`] instead of recursing.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, JobId};
use crate::job::CommandJob;
use crate::link::{Completion, DeviceLink};
use crate::protocol::Primitive;
use crate::resolver::DeviceResolver;

use super::monitor::Outcome;
use super::runtime::LoopEvent;
use super::state::LinkState;

// ============================================================================
// CommandQueue
// ============================================================================

/// FIFO of pending jobs plus the in-flight slot.
pub(crate) struct CommandQueue {
    /// Jobs waiting for dispatch.
    jobs: VecDeque<CommandJob>,
    /// Job awaiting its completion.
    in_flight: Option<CommandJob>,
    /// A keepalive probe is awaiting its completion.
    probing: bool,
    /// Link of the current operational epoch.
    link: Option<Arc<dyn DeviceLink>>,
    /// Epoch the link was attached in.
    epoch: Epoch,
    /// Set once the link first became operational.
    initialized: bool,
    /// Device resolver.
    resolver: Arc<dyn DeviceResolver>,
    /// Supervisor event channel.
    events: mpsc::UnboundedSender<LoopEvent>,
}

impl CommandQueue {
    /// Creates an uninitialized queue.
    pub(crate) fn new(
        resolver: Arc<dyn DeviceResolver>,
        events: mpsc::UnboundedSender<LoopEvent>,
    ) -> Self {
        Self {
            jobs: VecDeque::new(),
            in_flight: None,
            probing: false,
            link: None,
            epoch: Epoch::INITIAL,
            initialized: false,
            resolver,
            events,
        }
    }

    // ========================================================================
    // Link Attachment
    // ========================================================================

    /// Hands the queue the link of a newly operational epoch.
    pub(crate) fn attach(&mut self, link: Arc<dyn DeviceLink>, epoch: Epoch) {
        self.link = Some(link);
        self.epoch = epoch;
        self.probing = false;
        self.initialized = true;
        debug!(%epoch, "Command queue attached");
        self.schedule();
    }

    /// Drops the link and fails every pending job with
    /// [`Error::LinkUnavailable`].
    pub(crate) fn detach(&mut self, state: LinkState) {
        self.link = None;
        self.probing = false;

        let pending: Vec<CommandJob> = self
            .in_flight
            .take()
            .into_iter()
            .chain(self.jobs.drain(..))
            .collect();

        if !pending.is_empty() {
            debug!(count = pending.len(), %state, "Failing pending commands");
        }

        for job in pending {
            job.finish(Err(Error::link_unavailable(state)));
        }
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Queues a job and tries to dispatch.
    ///
    /// Before the first operational epoch the job is dropped without an
    /// outcome. While the link is down it fails immediately.
    ///
    /// Returns an outcome if a job finished synchronously.
    pub(crate) fn push(&mut self, job: CommandJob, state: LinkState) -> Option<Outcome> {
        if !self.initialized {
            warn!(
                job_id = %job.id(),
                device = %job.target(),
                error = %Error::QueueNotInitialized,
                "Dropping command"
            );
            return None;
        }

        if self.link.is_none() {
            debug!(job_id = %job.id(), %state, "Link down, refusing command");
            job.finish(Err(Error::link_unavailable(state)));
            return None;
        }

        trace!(job_id = %job.id(), queued = self.jobs.len() + 1, "Command queued");
        self.jobs.push_back(job);
        self.dispatch_next()
    }

    /// Dispatches the head job if the link is idle.
    ///
    /// Returns an outcome if the link rejected the primitive synchronously.
    pub(crate) fn dispatch_next(&mut self) -> Option<Outcome> {
        if self.is_busy() {
            return None;
        }
        let link = self.link.clone()?;
        let job = self.jobs.pop_front()?;

        let addressing = self
            .resolver
            .resolve(job.target())
            .filter(|addressing| addressing.family() == job.family());

        let Some(addressing) = addressing else {
            warn!(
                job_id = %job.id(),
                device = %job.target(),
                family = %job.family(),
                "Device not found"
            );
            let device = job.target().clone();
            job.finish(Err(Error::device_not_found(device)));
            self.schedule();
            return None;
        };

        let job_id = job.id();
        let primitive = Primitive::for_action(&addressing, job.action());
        debug!(job_id = %job_id, device = %job.target(), %primitive, "Dispatching command");

        self.in_flight = Some(job);
        let completion = Completion::job(self.epoch, job_id, self.events.clone());

        if let Err(e) = link.send(primitive, completion) {
            warn!(job_id = %job_id, error = %e, "Device link rejected command");
            return self.complete(job_id, Err(e));
        }

        None
    }

    /// Finishes the in-flight job.
    ///
    /// Completions for any other job are ignored. Returns the outcome to
    /// feed to the failure monitor.
    pub(crate) fn complete(&mut self, job_id: JobId, result: Result<()>) -> Option<Outcome> {
        if self.in_flight.as_ref().map(CommandJob::id) != Some(job_id) {
            debug!(job_id = %job_id, "Ignoring completion for job not in flight");
            return None;
        }
        let job = self.in_flight.take()?;

        let outcome = Outcome::of(&result);
        match &result {
            Ok(()) => debug!(job_id = %job_id, "Command succeeded"),
            Err(e) => warn!(job_id = %job_id, error = %e, "Command failed"),
        }

        job.finish(result);
        self.schedule();
        Some(outcome)
    }

    // ========================================================================
    // Keepalive Probe
    // ========================================================================

    /// Sends a status probe if the link is idle.
    ///
    /// Dispatch is held until the probe completes.
    pub(crate) fn send_probe(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        let Some(link) = self.link.clone() else {
            return false;
        };

        self.probing = true;
        let completion = Completion::probe(self.epoch, self.events.clone());

        if let Err(e) = link.send(Primitive::StatusProbe, completion) {
            warn!(error = %e, "Keepalive probe rejected");
            self.probing = false;
            return false;
        }

        trace!(epoch = %self.epoch, "Keepalive probe sent");
        true
    }

    /// Clears the probe flag and resumes dispatch.
    pub(crate) fn probe_done(&mut self, result: Result<()>) {
        if !self.probing {
            trace!("Ignoring probe completion without probe in flight");
            return;
        }
        self.probing = false;

        match result {
            Ok(()) => debug!("Keepalive probe answered"),
            Err(e) => debug!(error = %e, "Keepalive probe failed"),
        }
        self.schedule();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the number of jobs waiting for dispatch.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if a job is in flight.
    #[inline]
    pub(crate) fn is_dispatching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns `true` if a job or probe is in flight.
    #[inline]
    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.probing
    }

    /// Returns `true` once a link has been attached.
    #[inline]
    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Posts a dispatch step if jobs are waiting.
    fn schedule(&self) {
        if !self.jobs.is_empty() {
            let _ = self.events.send(LoopEvent::Dispatch);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::protocol::{Action, Addressing, Family};
    use crate::resolver::DeviceTable;
    use crate::supervisor::runtime::CompletionTarget;

    /// Link that records primitives and holds their completions.
    #[derive(Default)]
    struct RecordingLink {
        sent: Mutex<Vec<(Primitive, Completion)>>,
        reject: bool,
    }

    impl DeviceLink for RecordingLink {
        fn send(&self, primitive: Primitive, completion: Completion) -> Result<()> {
            if self.reject {
                return Err(Error::command_failed("port closed"));
            }
            self.sent.lock().push((primitive, completion));
            Ok(())
        }

        fn close(&self) {}
    }

    fn table() -> Arc<DeviceTable> {
        let table = DeviceTable::new();
        table
            .insert("ARC_A_1", Addressing::remote_code('A', 1).expect("addr"))
            .expect("insert");
        table
            .insert(
                "AC_123456_0",
                Addressing::addressable_switch("123456", 0).expect("addr"),
            )
            .expect("insert");
        Arc::new(table)
    }

    fn queue() -> (CommandQueue, mpsc::UnboundedReceiver<LoopEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CommandQueue::new(table(), tx), rx)
    }

    fn counting_job(
        family: Family,
        target: &str,
        action: Action,
        counter: &Arc<AtomicUsize>,
    ) -> CommandJob {
        let counter = Arc::clone(counter);
        CommandJob::new(family, target, action, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_push_before_attach_drops_job() {
        let (mut queue, _rx) = queue();
        let (job, mut outcome) =
            CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::On);

        assert!(queue.push(job, LinkState::AwaitingHandshakeAck).is_none());
        assert_eq!(queue.len(), 0);
        assert!(!queue.is_initialized());
        assert!(outcome.try_recv().is_err());
    }

    #[test]
    fn test_single_flight_fifo() {
        let (mut queue, _rx) = queue();
        let link = Arc::new(RecordingLink::default());
        queue.attach(link.clone(), Epoch::INITIAL.next());

        let counter = Arc::new(AtomicUsize::new(0));
        queue.push(
            counting_job(Family::RemoteCode, "ARC_A_1", Action::Open, &counter),
            LinkState::Operational,
        );
        queue.push(
            counting_job(Family::AddressableSwitch, "AC_123456_0", Action::Stop, &counter),
            LinkState::Operational,
        );

        assert!(queue.is_dispatching());
        assert_eq!(queue.len(), 1);
        assert_eq!(link.sent.lock().len(), 1);

        // Further dispatch attempts wait for the in-flight job.
        assert!(queue.dispatch_next().is_none());
        assert_eq!(link.sent.lock().len(), 1);

        let (primitive, _completion) = link.sent.lock().remove(0);
        assert_eq!(
            primitive,
            Primitive::SwitchUp {
                house_code: 'A',
                unit_code: 1
            }
        );

        let unknown = JobId::next();
        assert!(queue.complete(unknown, Ok(())).is_none());
        assert!(queue.is_dispatching());
    }

    #[test]
    fn test_complete_releases_slot_and_schedules() {
        let (mut queue, mut rx) = queue();
        let link = Arc::new(RecordingLink::default());
        queue.attach(link.clone(), Epoch::INITIAL.next());

        let counter = Arc::new(AtomicUsize::new(0));
        let first = counting_job(Family::RemoteCode, "ARC_A_1", Action::On, &counter);
        let first_id = first.id();
        queue.push(first, LinkState::Operational);
        queue.push(
            counting_job(Family::RemoteCode, "ARC_A_1", Action::Off, &counter),
            LinkState::Operational,
        );

        let outcome = queue.complete(first_id, Err(Error::command_timeout("switch-up A1")));
        assert_eq!(outcome, Some(Outcome::Timeout));
        assert!(!queue.is_dispatching());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(matches!(rx.try_recv(), Ok(LoopEvent::Dispatch)));

        // Duplicate completion is ignored.
        assert!(queue.complete(first_id, Ok(())).is_none());

        assert!(queue.dispatch_next().is_none());
        assert_eq!(link.sent.lock().len(), 2);
        assert_eq!(
            link.sent.lock()[1].0,
            Primitive::SwitchDown {
                house_code: 'A',
                unit_code: 1
            }
        );
    }

    #[test]
    fn test_unknown_device_finishes_without_primitive() {
        let (mut queue, mut rx) = queue();
        let link = Arc::new(RecordingLink::default());
        queue.attach(link.clone(), Epoch::INITIAL.next());

        // Hold dispatch so both jobs queue up behind a probe.
        assert!(queue.send_probe());

        let (job, mut outcome) =
            CommandJob::with_channel(Family::RemoteCode, "ARC_Z_9", Action::On);
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(queue.push(job, LinkState::Operational).is_none());
        queue.push(
            counting_job(Family::RemoteCode, "ARC_A_1", Action::On, &counter),
            LinkState::Operational,
        );
        assert_eq!(queue.len(), 2);

        queue.probe_done(Ok(()));
        assert!(matches!(rx.try_recv(), Ok(LoopEvent::Dispatch)));

        assert!(queue.dispatch_next().is_none());
        let result = outcome.try_recv().expect("outcome");
        assert!(matches!(result, Err(Error::DeviceNotFound { .. })));
        assert_eq!(link.sent.lock().len(), 1);
        assert!(matches!(rx.try_recv(), Ok(LoopEvent::Dispatch)));

        assert!(queue.dispatch_next().is_none());
        assert!(queue.is_dispatching());
        assert_eq!(link.sent.lock().len(), 2);
    }

    #[test]
    fn test_family_mismatch_is_device_not_found() {
        let (mut queue, _rx) = queue();
        queue.attach(Arc::new(RecordingLink::default()), Epoch::INITIAL.next());

        let (job, mut outcome) =
            CommandJob::with_channel(Family::AddressableSwitch, "ARC_A_1", Action::On);
        queue.push(job, LinkState::Operational);

        assert!(matches!(
            outcome.try_recv().expect("outcome"),
            Err(Error::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_sync_send_error_releases_slot_once() {
        let (mut queue, mut rx) = queue();
        let link = Arc::new(RecordingLink {
            reject: true,
            ..RecordingLink::default()
        });
        queue.attach(link, Epoch::INITIAL.next());

        let (job, mut outcome) =
            CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::On);
        let job_id = job.id();

        assert_eq!(
            queue.push(job, LinkState::Operational),
            Some(Outcome::Failed)
        );
        assert!(!queue.is_dispatching());
        assert!(matches!(
            outcome.try_recv().expect("outcome"),
            Err(Error::CommandFailed { .. })
        ));

        // The dropped completion still reports, and is ignored.
        match rx.try_recv().expect("dropped completion") {
            LoopEvent::Completed { target, result, .. } => {
                assert_eq!(target, CompletionTarget::Job(job_id));
                assert!(queue.complete(job_id, result).is_none());
            }
            _ => panic!("Expected completion event"),
        }
    }

    #[test]
    fn test_detach_fails_pending_and_refuses_new() {
        let (mut queue, _rx) = queue();
        queue.attach(Arc::new(RecordingLink::default()), Epoch::INITIAL.next());

        let (in_flight, mut in_flight_rx) =
            CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::On);
        let (queued, mut queued_rx) =
            CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::Off);
        queue.push(in_flight, LinkState::Operational);
        queue.push(queued, LinkState::Operational);

        queue.detach(LinkState::ReconnectScheduled);
        assert!(!queue.is_dispatching());
        assert_eq!(queue.len(), 0);

        for rx in [&mut in_flight_rx, &mut queued_rx] {
            match rx.try_recv().expect("outcome") {
                Err(Error::LinkUnavailable { state }) => {
                    assert_eq!(state, LinkState::ReconnectScheduled);
                }
                other => panic!("Expected LinkUnavailable, got {other:?}"),
            }
        }

        let (late, mut late_rx) =
            CommandJob::with_channel(Family::RemoteCode, "ARC_A_1", Action::Stop);
        queue.push(late, LinkState::Connecting);
        assert!(matches!(
            late_rx.try_recv().expect("outcome"),
            Err(Error::LinkUnavailable { .. })
        ));
    }

    #[test]
    fn test_probe_holds_dispatch() {
        let (mut queue, _rx) = queue();
        let link = Arc::new(RecordingLink::default());
        queue.attach(link.clone(), Epoch::INITIAL.next());

        assert!(queue.send_probe());
        assert!(!queue.send_probe());
        assert_eq!(link.sent.lock()[0].0, Primitive::StatusProbe);

        let counter = Arc::new(AtomicUsize::new(0));
        queue.push(
            counting_job(Family::RemoteCode, "ARC_A_1", Action::On, &counter),
            LinkState::Operational,
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(link.sent.lock().len(), 1);

        queue.probe_done(Ok(()));
        assert!(queue.dispatch_next().is_none());
        assert!(queue.is_dispatching());
        assert_eq!(link.sent.lock().len(), 2);
    }
}
