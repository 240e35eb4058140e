//! Scripted device link for supervisor tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use rfxlink::{
    Addressing, Completion, DeviceLink, DeviceTable, Error, FatalReceiver, LinkConfig, LinkOpener,
    LinkSignal, Primitive, Result, SignalSink, Supervisor, Timings,
};

/// Delay before the fake transceiver acknowledges a primitive.
pub const REPLY_DELAY: Duration = Duration::from_millis(100);

/// Per-command timeout of the fake driver.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lets the supervisor drain its channels.
pub async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

// ============================================================================
// Scripts
// ============================================================================

/// Signals emitted while a link opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Ready, init-complete, receiver started.
    Full,
    /// Ready only.
    AckOnly,
    /// Receiver started without ready.
    ReceiverOnly,
    /// Nothing at all.
    Silent,
    /// Driver reports a failed connect.
    ConnectFailed,
    /// `open` itself fails.
    OpenError,
}

/// How the fake transceiver answers primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Respond {
    /// Success after [`REPLY_DELAY`].
    Ok,
    /// Timeout after [`COMMAND_TIMEOUT`].
    Timeout,
    /// Held until [`FakeOpener::complete_next`].
    Manual,
    /// `send` fails synchronously.
    Reject,
}

// ============================================================================
// FakeOpener
// ============================================================================

/// State shared by the opener and every link it opened.
struct Shared {
    opens: AtomicUsize,
    handshake: Mutex<Handshake>,
    respond: Mutex<Respond>,
    sent: Mutex<Vec<Primitive>>,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    held: Mutex<VecDeque<Completion>>,
    links: Mutex<Vec<Arc<FakeLink>>>,
}

/// Opener producing scripted links.
pub struct FakeOpener {
    shared: Arc<Shared>,
}

impl FakeOpener {
    pub fn new(handshake: Handshake, respond: Respond) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared {
                opens: AtomicUsize::new(0),
                handshake: Mutex::new(handshake),
                respond: Mutex::new(respond),
                sent: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
                max_outstanding: AtomicUsize::new(0),
                held: Mutex::new(VecDeque::new()),
                links: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn set_handshake(&self, handshake: Handshake) {
        *self.shared.handshake.lock() = handshake;
    }

    pub fn set_respond(&self, respond: Respond) {
        *self.shared.respond.lock() = respond;
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Primitive> {
        self.shared.sent.lock().clone()
    }

    pub fn probes(&self) -> usize {
        self.sent()
            .iter()
            .filter(|p| **p == Primitive::StatusProbe)
            .count()
    }

    pub fn max_outstanding(&self) -> usize {
        self.shared.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> usize {
        self.shared.held.lock().len()
    }

    /// Answers the oldest held primitive.
    pub fn complete_next(&self, result: Result<()>) -> bool {
        let Some(completion) = self.shared.held.lock().pop_front() else {
            return false;
        };
        self.shared.outstanding.fetch_sub(1, Ordering::SeqCst);
        completion.complete(result);
        true
    }

    /// Emits a signal on the most recently opened link.
    pub fn emit(&self, signal: LinkSignal) -> bool {
        let link = self.shared.links.lock().last().cloned();
        link.is_some_and(|link| link.signals.emit(signal))
    }

    /// Emits a signal on the `index`-th opened link.
    pub fn emit_on(&self, index: usize, signal: LinkSignal) -> bool {
        let link = self.shared.links.lock().get(index).cloned();
        link.is_some_and(|link| link.signals.emit(signal))
    }

    /// Returns `true` if the `index`-th opened link was closed.
    pub fn is_closed(&self, index: usize) -> bool {
        self.shared
            .links
            .lock()
            .get(index)
            .is_some_and(|link| link.closed.load(Ordering::SeqCst))
    }
}

impl LinkOpener for FakeOpener {
    fn open(&self, _config: &LinkConfig, signals: SignalSink) -> Result<Arc<dyn DeviceLink>> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        match *self.shared.handshake.lock() {
            Handshake::OpenError => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no such device",
                )));
            }
            Handshake::ConnectFailed => {
                signals.emit(LinkSignal::ConnectFailed {
                    message: "port busy".to_string(),
                });
            }
            Handshake::Full => {
                signals.emit(LinkSignal::HandshakeAck);
                signals.emit(LinkSignal::InitComplete);
                signals.emit(LinkSignal::ReceiverStarted);
            }
            Handshake::AckOnly => {
                signals.emit(LinkSignal::HandshakeAck);
            }
            Handshake::ReceiverOnly => {
                signals.emit(LinkSignal::ReceiverStarted);
            }
            Handshake::Silent => {}
        }

        let link = Arc::new(FakeLink {
            signals,
            shared: Arc::clone(&self.shared),
            closed: AtomicBool::new(false),
        });
        self.shared.links.lock().push(Arc::clone(&link));

        let link: Arc<dyn DeviceLink> = link;
        Ok(link)
    }
}

// ============================================================================
// FakeLink
// ============================================================================

/// One opened fake link.
pub struct FakeLink {
    signals: SignalSink,
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl DeviceLink for FakeLink {
    fn send(&self, primitive: Primitive, completion: Completion) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::command_failed("link closed"));
        }

        let respond = *self.shared.respond.lock();
        if respond == Respond::Reject {
            return Err(Error::command_failed("driver rejected primitive"));
        }

        self.shared.sent.lock().push(primitive.clone());
        let outstanding = self.shared.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared
            .max_outstanding
            .fetch_max(outstanding, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        match respond {
            Respond::Ok => {
                tokio::spawn(async move {
                    sleep(REPLY_DELAY).await;
                    shared.outstanding.fetch_sub(1, Ordering::SeqCst);
                    completion.complete(Ok(()));
                });
            }
            Respond::Timeout => {
                tokio::spawn(async move {
                    sleep(COMMAND_TIMEOUT).await;
                    shared.outstanding.fetch_sub(1, Ordering::SeqCst);
                    completion.complete(Err(Error::command_timeout(primitive.to_string())));
                });
            }
            Respond::Manual => shared.held.lock().push_back(completion),
            Respond::Reject => {}
        }

        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Devices known to every test.
pub fn device_table() -> Arc<DeviceTable> {
    let table = DeviceTable::new();
    let devices = [
        ("ARC_A_1", Addressing::remote_code('A', 1)),
        ("ARC_B_2", Addressing::remote_code('B', 2)),
        ("AC_123456_0", Addressing::addressable_switch("123456", 0)),
    ];
    for (device, addressing) in devices {
        let addressing = addressing.expect("valid addressing");
        table.insert(device, addressing).expect("insert device");
    }
    Arc::new(table)
}

/// Spawns a supervisor on the fake opener with default timings.
pub fn spawn(opener: &Arc<FakeOpener>) -> (Supervisor, FatalReceiver) {
    init_tracing();
    Supervisor::builder()
        .opener(opener.clone())
        .resolver(device_table())
        .timings(Timings::default())
        .spawn()
        .expect("spawn supervisor")
}

/// Spawns and starts a supervisor, waiting for the link to be operational.
pub async fn operational(opener: &Arc<FakeOpener>) -> (Supervisor, FatalReceiver) {
    let (supervisor, fatal) = spawn(opener);
    supervisor
        .start(LinkConfig::new("/dev/ttyUSB0"))
        .expect("start");
    supervisor
        .wait_operational()
        .await
        .expect("link operational");
    (supervisor, fatal)
}
