// MIT License

//! The connection engine.
//!
//! Owns the socket, the outbound queue, the timers, the subscription
//! registry and the lifecycle state. Three cooperating tasks per session:
//! the supervisor (connect attempts, read loop, frame dispatch), the
//! single-writer outbound task, and the heartbeat timer. User-facing
//! operations only ever enqueue; the outbound task is the sole writer to
//! the socket.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::codec::{self, InboundMessage, UpdateKind};
use crate::config::{CipConfig, DebugLevel};
use crate::constants::{
    END_OF_QUERY_ACK_FRAME, HEARTBEAT_FRAME, UPDATE_REQUEST_FRAME, WRITE_PACING,
};
use crate::error::{CipError, Result};
use crate::framing::{Frame, FrameBuffer};
use crate::registry::{SignalCallback, SubscriptionRegistry};
use crate::signal::{ConnectionState, SignalType, SignalValue};

/// One entry in the outbound queue. Multi-frame operations (pulse, the
/// end-of-query reply pair) travel as a single entry so no other frame
/// can be interleaved between them.
pub(crate) struct Outbound {
    what: &'static str,
    frames: Vec<Vec<u8>>,
}

impl Outbound {
    fn single(what: &'static str, frame: Vec<u8>) -> Self {
        Self {
            what,
            frames: vec![frame],
        }
    }

    fn batch(what: &'static str, frames: Vec<Vec<u8>>) -> Self {
        Self { what, frames }
    }
}

/// State shared between the facade, the supervisor and the session tasks.
pub(crate) struct Shared {
    config: CipConfig,
    state: AtomicU8,
    registered: AtomicBool,
    registry: SubscriptionRegistry,
    /// Present only while a session holds the socket.
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    /// Latched on an "IPID does not exist" registration response so the
    /// supervisor refuses to retry a misconfigured identity.
    ipid_rejected: AtomicBool,
}

impl Shared {
    fn new(config: CipConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            registered: AtomicBool::new(false),
            registry: SubscriptionRegistry::new(),
            outbound: Mutex::new(None),
            ipid_rejected: AtomicBool::new(false),
        }
    }

    pub(crate) fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.swap(next as u8, Ordering::AcqRel);
        if prev == next as u8 {
            return;
        }
        if self.config.debug >= DebugLevel::Low {
            info!(
                "connection state: {} -> {}",
                ConnectionState::from_u8(prev),
                next
            );
        }
        if let Some(callback) = &self.config.on_connection_change {
            if catch_unwind(AssertUnwindSafe(|| callback(next))).is_err() {
                warn!("connection-state callback panicked");
            }
        }
    }

    fn set_registered(&self, registered: bool) {
        let prev = self.registered.swap(registered, Ordering::AcqRel);
        if prev == registered {
            return;
        }
        if self.config.debug >= DebugLevel::Low {
            info!("registration state: {}", registered);
        }
        if let Some(callback) = &self.config.on_registration_change {
            if catch_unwind(AssertUnwindSafe(|| callback(registered))).is_err() {
                warn!("registration-state callback panicked");
            }
        }
    }

    fn install_outbound(&self, tx: mpsc::UnboundedSender<Outbound>) {
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    fn clear_outbound(&self) {
        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Enqueue without the readiness gate; engine-initiated frames
    /// (registration replies, heartbeats) use this directly.
    fn enqueue(&self, out: Outbound) -> Result<()> {
        let guard = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.send(out).map_err(|_| CipError::ChannelClosed),
            None => Err(CipError::Disconnected),
        }
    }

    /// Enqueue a user-initiated operation. Refused unless connected and
    /// registered; nothing reaches the wire on refusal.
    pub(crate) fn send_frames(&self, what: &'static str, frames: Vec<Vec<u8>>) -> Result<()> {
        let state = self.connection_state();
        let registered = self.registered();
        if state != ConnectionState::Connected || !registered {
            if self.config.debug >= DebugLevel::Low {
                error!("cannot send {what}: connection {state}, registered={registered}");
            }
            return Err(CipError::NotReady { state, registered });
        }
        self.enqueue(Outbound::batch(what, frames))
    }

    pub(crate) fn subscribe(&self, signal_type: SignalType, join: u16, callback: SignalCallback) {
        self.registry.subscribe(signal_type, join, callback);
    }

    fn dispatch(&self, signal_type: SignalType, join: u16, value: SignalValue) {
        if self.config.debug >= DebugLevel::Moderate {
            debug!("RX {}{} = {}", signal_type.tag(), join, value);
        }
        self.registry.dispatch(signal_type, join, &value);
    }
}

/// Why a session ended.
enum SessionEnd {
    Shutdown,
    RemoteClosed,
    ReadError(std::io::Error),
    WriteFailed(CipError),
    Framing(String),
    IpidRejected,
    RegistrationUnknown,
    ControlSystemDisconnect,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "local disconnect"),
            Self::RemoteClosed => write!(f, "remote closed the connection"),
            Self::ReadError(e) => write!(f, "read error: {e}"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::Framing(details) => write!(f, "framing error: {details}"),
            Self::IpidRejected => write!(f, "registration rejected (IPID does not exist)"),
            Self::RegistrationUnknown => write!(f, "unknown registration response"),
            Self::ControlSystemDisconnect => write!(f, "control system requested disconnect"),
        }
    }
}

/// The connection engine. Created disconnected; `connect` spawns the
/// supervisor that drives the lifecycle until `disconnect`.
pub struct CipComm {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    supervisor: Option<JoinHandle<()>>,
}

impl CipComm {
    pub fn new(config: CipConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared::new(config)),
            shutdown_tx,
            supervisor: None,
        }
    }

    /// Start the connection lifecycle. Returns immediately; progress is
    /// observable through the state accessors and configured callbacks.
    pub async fn connect(&mut self, auto_reconnect: bool) -> Result<()> {
        if let Some(handle) = &self.supervisor {
            if !handle.is_finished() {
                return Err(CipError::AlreadyConnected);
            }
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = shutdown_tx;
        self.shared.ipid_rejected.store(false, Ordering::Release);
        let shared = self.shared.clone();
        self.supervisor = Some(tokio::spawn(run_supervisor(
            shared,
            auto_reconnect,
            shutdown_rx,
        )));
        Ok(())
    }

    /// Disable auto-reconnect, close the socket and cancel all timers and
    /// pending writes. Idempotent.
    pub async fn disconnect(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.shared.clear_outbound();
        if let Some(handle) = self.supervisor.take() {
            let _ = handle.await;
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.connection_state()
    }

    pub fn registered(&self) -> bool {
        self.shared.registered()
    }

    pub fn subscribe(&self, signal_type: SignalType, join: u16, callback: SignalCallback) {
        self.shared.subscribe(signal_type, join, callback);
    }

    pub(crate) fn send_frames(&self, what: &'static str, frames: Vec<Vec<u8>>) -> Result<()> {
        self.shared.send_frames(what, frames)
    }
}

impl Drop for CipComm {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
    }
}

/// Connect, run a session, decide whether to retry. One supervisor exists
/// per `connect` call; it exits on `disconnect`, on an exhausted policy
/// (no auto-reconnect) or on a rejected IPID.
async fn run_supervisor(
    shared: Arc<Shared>,
    auto_reconnect: bool,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let config = &shared.config;
    let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
    let retry_delay = Duration::from_millis(config.retry_delay_ms);
    let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        shared.set_state(ConnectionState::Connecting);

        let attempt = tokio::select! {
            _ = shutdown_rx.changed() => break,
            res = timeout(
                connect_timeout,
                TcpStream::connect((config.host.as_str(), config.port)),
            ) => res,
        };

        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                if config.debug >= DebugLevel::Low {
                    warn!("connect to {}:{} failed: {}", config.host, config.port, e);
                }
                if !retry_or_stop(&shared, auto_reconnect, retry_delay, &mut shutdown_rx).await {
                    break;
                }
                continue;
            }
            Err(_) => {
                if config.debug >= DebugLevel::Low {
                    warn!("connect to {}:{} timed out", config.host, config.port);
                }
                if !retry_or_stop(&shared, auto_reconnect, retry_delay, &mut shutdown_rx).await {
                    break;
                }
                continue;
            }
        };

        if config.debug >= DebugLevel::Low {
            info!("connected to {}:{}", config.host, config.port);
        }
        shared.set_state(ConnectionState::Connected);

        let end = run_session(&shared, stream, &mut shutdown_rx).await;

        // Registration is cleared before the disconnect state change so
        // observers never see registered-but-disconnected.
        shared.set_registered(false);
        shared.clear_outbound();
        shared.set_state(ConnectionState::Disconnected);

        if config.debug >= DebugLevel::Low {
            info!("session ended: {end}");
        }

        if matches!(end, SessionEnd::Shutdown) || *shutdown_rx.borrow() {
            break;
        }
        if shared.ipid_rejected.load(Ordering::Acquire) {
            if config.reconnect_on_ipid_rejection {
                if config.debug >= DebugLevel::Low {
                    warn!(
                        "IPID 0x{:02X} rejected by processor; retrying anyway as configured",
                        config.ipid
                    );
                }
            } else {
                if config.debug >= DebugLevel::Low {
                    error!(
                        "IPID 0x{:02X} rejected by processor; giving up (fix the configuration)",
                        config.ipid
                    );
                }
                break;
            }
        }
        if !auto_reconnect {
            break;
        }
        shared.set_state(ConnectionState::Retrying);
        if sleep_or_shutdown(reconnect_delay, &mut shutdown_rx).await {
            break;
        }
    }

    shared.set_registered(false);
    shared.set_state(ConnectionState::Disconnected);
}

/// After a failed connect attempt: arm the retry timer, or stop if the
/// policy forbids retrying. Returns false when the supervisor should exit.
async fn retry_or_stop(
    shared: &Arc<Shared>,
    auto_reconnect: bool,
    retry_delay: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    if !auto_reconnect {
        shared.set_state(ConnectionState::Disconnected);
        return false;
    }
    shared.set_state(ConnectionState::Retrying);
    !sleep_or_shutdown(retry_delay, shutdown_rx).await
}

/// Sleep, returning early (true) if shutdown is signalled.
async fn sleep_or_shutdown(duration: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = sleep(duration) => false,
        res = shutdown_rx.changed() => res.is_err() || *shutdown_rx.borrow(),
    }
}

/// Drive one established connection until it ends: feed the frame buffer
/// from the socket, decode and act on every frame, and tear down the
/// writer and heartbeat tasks on the way out.
async fn run_session(
    shared: &Arc<Shared>,
    stream: TcpStream,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut reader, writer) = stream.into_split();

    let (tx, rx) = mpsc::unbounded_channel();
    shared.install_outbound(tx);
    let (fail_tx, mut fail_rx) = oneshot::channel();
    let writer_task = tokio::spawn(run_writer(shared.clone(), writer, rx, fail_tx));

    let mut heartbeat: Option<JoinHandle<()>> = None;
    let mut frames = FrameBuffer::new();
    let mut chunk = vec![0u8; 4096];

    let end = 'session: loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break 'session SessionEnd::Shutdown;
                }
            }
            res = &mut fail_rx => match res {
                Ok(e) => break 'session SessionEnd::WriteFailed(e),
                // The writer exits silently only when the queue was torn
                // down, which means a local disconnect is in progress.
                Err(_) => break 'session SessionEnd::Shutdown,
            },
            res = reader.read(&mut chunk) => match res {
                Ok(0) => break 'session SessionEnd::RemoteClosed,
                Ok(n) => {
                    frames.extend(&chunk[..n]);
                    loop {
                        match frames.next_frame() {
                            Ok(Some(frame)) => {
                                if let Some(end) = handle_frame(shared, &frame, &mut heartbeat) {
                                    break 'session end;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => break 'session SessionEnd::Framing(e.to_string()),
                        }
                    }
                }
                Err(e) => break 'session SessionEnd::ReadError(e),
            }
        }
    };

    if let Some(handle) = heartbeat.take() {
        handle.abort();
    }
    shared.clear_outbound();
    writer_task.abort();
    end
}

/// React to one decoded frame. Returns `Some` when the session must end.
fn handle_frame(
    shared: &Arc<Shared>,
    frame: &Frame,
    heartbeat: &mut Option<JoinHandle<()>>,
) -> Option<SessionEnd> {
    let config = &shared.config;
    if config.debug >= DebugLevel::High {
        debug!("RX {}", dump_frame(frame));
    }

    let msg = match codec::decode(frame.frame_type, &frame.payload) {
        Ok(msg) => msg,
        Err(e) => return Some(SessionEnd::Framing(e.to_string())),
    };

    match msg {
        InboundMessage::Heartbeat => {
            if config.debug >= DebugLevel::Moderate {
                debug!("RX heartbeat");
            }
            None
        }
        InboundMessage::RegistrationRequest => {
            if config.debug >= DebugLevel::Moderate {
                debug!("registration request; identifying as IPID 0x{:02X}", config.ipid);
            }
            let _ = shared.enqueue(Outbound::single(
                "registration",
                codec::encode_registration(config.ipid),
            ));
            None
        }
        InboundMessage::RegistrationAccepted => {
            if config.debug >= DebugLevel::Low {
                info!("registered with processor as IPID 0x{:02X}", config.ipid);
            }
            // The success reply is queued before the heartbeat timer is
            // armed, so it always precedes the first heartbeat frame.
            let _ = shared.enqueue(Outbound::single(
                "registration reply",
                UPDATE_REQUEST_FRAME.to_vec(),
            ));
            *heartbeat = Some(spawn_heartbeat(shared));
            shared.set_registered(true);
            None
        }
        InboundMessage::RegistrationRejected => {
            shared.ipid_rejected.store(true, Ordering::Release);
            Some(SessionEnd::IpidRejected)
        }
        InboundMessage::RegistrationUnknown => Some(SessionEnd::RegistrationUnknown),
        InboundMessage::Disconnect => Some(SessionEnd::ControlSystemDisconnect),
        InboundMessage::Digital { join, high } => {
            shared.dispatch(SignalType::Digital, join, SignalValue::Bool(high));
            None
        }
        InboundMessage::Analog { join, value } => {
            shared.dispatch(SignalType::Analog, join, SignalValue::U16(value));
            None
        }
        InboundMessage::Serial { join, text } => {
            shared.dispatch(SignalType::Serial, join, SignalValue::Text(text));
            None
        }
        InboundMessage::Update(kind) => {
            match kind {
                UpdateKind::EndOfQuery => {
                    if config.debug >= DebugLevel::Moderate {
                        debug!("end of query; acknowledging");
                    }
                    let _ = shared.enqueue(Outbound::batch(
                        "end-of-query reply",
                        vec![END_OF_QUERY_ACK_FRAME.to_vec(), HEARTBEAT_FRAME.to_vec()],
                    ));
                }
                UpdateKind::Standard | UpdateKind::EndOfQueryAck => {
                    if config.debug >= DebugLevel::Moderate {
                        debug!("update subframe {:?}", kind);
                    }
                }
                UpdateKind::Penultimate => {
                    // Semantics undocumented; the processor expects no
                    // reply and gets none.
                    if config.debug >= DebugLevel::Moderate {
                        debug!("penultimate update");
                    }
                }
                UpdateKind::Other(sub) => {
                    if config.debug >= DebugLevel::Low {
                        warn!("unrecognised update subframe 0x{sub:02X}");
                    }
                }
            }
            None
        }
        InboundMessage::DateTime => {
            if config.debug >= DebugLevel::Moderate {
                debug!("date/time broadcast from processor");
            }
            None
        }
        InboundMessage::UnknownData { subtype } => {
            if config.debug >= DebugLevel::Low {
                warn!("unrecognised data subframe 0x{subtype:02X}");
            }
            None
        }
        InboundMessage::Unknown { frame_type } => {
            if config.debug >= DebugLevel::Low {
                warn!("unrecognised frame type 0x{frame_type:02X}");
            }
            None
        }
    }
}

/// Emit a heartbeat every interval while registered. Aborted on any
/// disconnect, so exactly one timer exists per registered session.
fn spawn_heartbeat(shared: &Arc<Shared>) -> JoinHandle<()> {
    let shared = shared.clone();
    tokio::spawn(async move {
        let period = Duration::from_millis(shared.config.heartbeat_interval_ms);
        let mut ticks = interval_at(Instant::now() + period, period);
        loop {
            ticks.tick().await;
            if shared
                .enqueue(Outbound::single("heartbeat", HEARTBEAT_FRAME.to_vec()))
                .is_err()
            {
                break;
            }
        }
    })
}

/// Drain the outbound queue to the socket, one frame at a time with the
/// mandatory pacing pause after each write. The only writer to the socket.
async fn run_writer(
    shared: Arc<Shared>,
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    fail_tx: oneshot::Sender<CipError>,
) {
    let write_timeout = Duration::from_millis(shared.config.write_timeout_ms);
    while let Some(out) = rx.recv().await {
        for frame in &out.frames {
            if shared.config.debug >= DebugLevel::High {
                debug!("TX {} {}", out.what, codec::hex_dump(frame));
            }
            let failure = match timeout(write_timeout, writer.write_all(frame)).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(CipError::Io(e)),
                Err(_) => Some(CipError::WriteTimeout),
            };
            if let Some(e) = failure {
                if shared.config.debug >= DebugLevel::Low {
                    error!("write failed ({}): {}", out.what, e);
                }
                let _ = writer.shutdown().await;
                let _ = fail_tx.send(e);
                return;
            }
            sleep(WRITE_PACING).await;
        }
    }
}

fn dump_frame(frame: &Frame) -> String {
    let mut raw = Vec::with_capacity(3 + frame.payload.len());
    raw.push(frame.frame_type);
    raw.extend_from_slice(&(frame.payload.len() as u16).to_be_bytes());
    raw.extend_from_slice(&frame.payload);
    codec::hex_dump(&raw)
}
