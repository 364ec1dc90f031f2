use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;

use dolphinwatch_frame::{CommandWriter, FrameError, MessageReader, Separator};
use dolphinwatch_protocol::{AccessMode, Command, GcPadButtons, StickState, WiimoteButtons};
use dolphinwatch_transport::{
    TcpTransport, TransportError, WatchStream, DEFAULT_HOST, DEFAULT_PORT,
};
use tracing::{debug, info, trace, warn};

use crate::ack::AckSlot;
use crate::config::ConnectionConfig;
use crate::dispatch::{Dispatcher, Inbound};
use crate::error::{ClientError, Result};
use crate::registry::{CallbackRegistry, HandlerResult, MemoryValue, Registration};
use crate::sink::{LogSink, TracingSink};

/// Lifecycle state of a [`DolphinConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why a connection ended (or never started).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server closed the socket in an orderly way.
    ConnectionClosedByPeer,
    /// [`DolphinConnection::disconnect`] was called.
    ConnectionClosedByHost,
    /// The socket failed while reading or writing.
    ConnectionLost,
    /// The TCP connection could not be established.
    ConnectionNotEstablished,
}

impl DisconnectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DisconnectReason::ConnectionClosedByPeer => "connection closed by peer",
            DisconnectReason::ConnectionClosedByHost => "connection closed by host",
            DisconnectReason::ConnectionLost => "connection lost",
            DisconnectReason::ConnectionNotEstablished => "connection not established",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type ConnectHook = Arc<dyn Fn(&DolphinConnection) + Send + Sync>;
type DisconnectHook = Arc<dyn Fn(&DolphinConnection, DisconnectReason) + Send + Sync>;

#[derive(Default)]
struct Hooks {
    on_connect: Option<ConnectHook>,
    on_disconnect: Option<DisconnectHook>,
}

struct Link {
    state: ConnectionState,
    session: u64,
    separator: Separator,
    writer: Option<CommandWriter<WatchStream>>,
}

struct Shared {
    endpoint: Mutex<(String, u16)>,
    /// Held for the whole of a connect attempt.
    connecting: Mutex<()>,
    link: Mutex<Link>,
    registry: Arc<CallbackRegistry>,
    ack: Arc<AckSlot>,
    hooks: Mutex<Hooks>,
    dispatcher: Arc<Dispatcher>,
    log_sink: Arc<dyn LogSink>,
    config: ConnectionConfig,
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Link> {
        lock(&self.link)
    }

    fn inbound(&self) -> Inbound {
        Inbound {
            registry: Arc::clone(&self.registry),
            ack: Arc::clone(&self.ack),
            log_sink: Arc::clone(&self.log_sink),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }

    fn is_current(&self, session: u64) -> bool {
        let link = self.link();
        link.state == ConnectionState::Connected && link.session == session
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let link = self.link.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = link.writer.take() {
            let _ = writer.get_ref().shutdown();
        }
        self.ack.fail_pending();
    }
}

/// A connection to a DolphinWatch server.
///
/// Cloning yields another handle to the same connection. A background thread
/// reads server messages while connected; memory handlers run on a small
/// pool of handler threads. The socket is shut down when the last handle
/// is dropped.
#[derive(Clone)]
pub struct DolphinConnection {
    shared: Arc<Shared>,
}

impl Default for DolphinConnection {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl DolphinConnection {
    /// Create a disconnected connection for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(host, port, ConnectionConfig::default(), None)
    }

    /// Create a disconnected connection with explicit configuration.
    ///
    /// Server `LOG` messages go to `log_sink`, or to [`TracingSink`] if none
    /// is given.
    pub fn with_config(
        host: impl Into<String>,
        port: u16,
        config: ConnectionConfig,
        log_sink: Option<Arc<dyn LogSink>>,
    ) -> Self {
        let log_sink: Arc<dyn LogSink> = match log_sink {
            Some(sink) => sink,
            None => Arc::new(TracingSink),
        };
        let shared = Shared {
            endpoint: Mutex::new((host.into(), port)),
            connecting: Mutex::new(()),
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                session: 0,
                separator: Separator::Line,
                writer: None,
            }),
            registry: Arc::new(CallbackRegistry::new()),
            ack: Arc::new(AckSlot::new()),
            hooks: Mutex::new(Hooks::default()),
            dispatcher: Arc::new(Dispatcher::new(config.handler_workers)),
            log_sink,
            config,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn host(&self) -> String {
        lock(&self.shared.endpoint).0.clone()
    }

    pub fn port(&self) -> u16 {
        lock(&self.shared.endpoint).1
    }

    /// Change the target used by the next [`connect`](Self::connect).
    pub fn set_endpoint(&self, host: impl Into<String>, port: u16) {
        *lock(&self.shared.endpoint) = (host.into(), port);
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.link().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Call `hook` after every successful connect.
    pub fn on_connect<F>(&self, hook: F)
    where
        F: Fn(&DolphinConnection) + Send + Sync + 'static,
    {
        lock(&self.shared.hooks).on_connect = Some(Arc::new(hook));
    }

    pub fn clear_on_connect(&self) {
        lock(&self.shared.hooks).on_connect = None;
    }

    /// Call `hook` whenever the connection ends or fails to start.
    pub fn on_disconnect<F>(&self, hook: F)
    where
        F: Fn(&DolphinConnection, DisconnectReason) + Send + Sync + 'static,
    {
        lock(&self.shared.hooks).on_disconnect = Some(Arc::new(hook));
    }

    pub fn clear_on_disconnect(&self) {
        lock(&self.shared.hooks).on_disconnect = None;
    }

    /// Connect to the configured endpoint, dropping any current connection.
    ///
    /// Concurrent calls run one after another; the last one to finish owns
    /// the connection. Failures are not returned: the disconnect hook
    /// receives [`DisconnectReason::ConnectionNotEstablished`] instead.
    pub fn connect(&self) {
        let (replaced, outcome) = {
            let _attempt = lock(&self.shared.connecting);
            let replaced = self.detach(None);

            let (host, port) = lock(&self.shared.endpoint).clone();
            self.shared.link().state = ConnectionState::Connecting;
            debug!(host = %host, port, "connecting");

            let outcome = self.open(&host, port);
            match &outcome {
                Ok(session) => info!(host = %host, port, session, "connected"),
                Err(err) => {
                    let mut link = self.shared.link();
                    if link.state == ConnectionState::Connecting {
                        link.state = ConnectionState::Disconnected;
                    }
                    drop(link);
                    warn!(host = %host, port, error = %err, "connection failed");
                }
            }
            (replaced, outcome)
        };

        // Hooks may reconnect, so they run outside the attempt lock.
        if replaced {
            info!(reason = %DisconnectReason::ConnectionClosedByHost, "disconnected");
            self.notify_disconnect(DisconnectReason::ConnectionClosedByHost);
        }
        match outcome {
            Ok(_) => {
                let hook = lock(&self.shared.hooks).on_connect.clone();
                if let Some(hook) = hook {
                    hook(self);
                }
            }
            Err(_) => self.notify_disconnect(DisconnectReason::ConnectionNotEstablished),
        }
    }

    /// Close the connection. Does nothing when not connected.
    pub fn disconnect(&self) {
        self.teardown(DisconnectReason::ConnectionClosedByHost, None);
    }

    fn open(&self, host: &str, port: u16) -> Result<u64> {
        let config = &self.shared.config;
        let stream = TcpTransport::connect(host, port, config.connect_timeout)?;
        let reader = MessageReader::with_config(stream.try_clone()?, config.frame.clone());
        let writer = CommandWriter::with_write_timeout(stream, config.write_timeout)?;

        let mut link = self.shared.link();
        link.session += 1;
        let session = link.session;
        let weak = Arc::downgrade(&self.shared);
        let inbound = self.shared.inbound();

        // Spawned under the lock so the loop never observes a half-built link.
        let spawned = thread::Builder::new()
            .name(format!("dolphinwatch-recv-{session}"))
            .spawn(move || receive_loop(weak, inbound, reader, session));
        if let Err(err) = spawned {
            let _ = writer.get_ref().shutdown();
            return Err(TransportError::Io(err).into());
        }

        if let Some(previous) = link.writer.replace(writer) {
            let _ = previous.get_ref().shutdown();
        }
        link.state = ConnectionState::Connected;
        Ok(session)
    }

    /// Tear the link down and run the disconnect hook.
    ///
    /// With `session` set, only that session is torn down; a stale receive
    /// loop cannot end a newer connection.
    fn teardown(&self, reason: DisconnectReason, session: Option<u64>) {
        if self.detach(session) {
            info!(reason = %reason, "disconnected");
            self.notify_disconnect(reason);
        }
    }

    /// Close the socket and fail the pending acknowledgement without running
    /// hooks. Returns false if there was nothing to close.
    fn detach(&self, session: Option<u64>) -> bool {
        let writer = {
            let mut link = self.shared.link();
            if link.state != ConnectionState::Connected {
                return false;
            }
            if session.is_some_and(|session| session != link.session) {
                return false;
            }
            link.state = ConnectionState::Disconnected;
            link.writer.take()
        };

        if let Some(mut writer) = writer {
            let dropped = writer.discard_pending();
            if dropped > 0 {
                debug!(bytes = dropped, "dropped unsent batch");
            }
            let _ = writer.get_ref().shutdown();
        }
        self.shared.ack.fail_pending();
        true
    }

    fn notify_disconnect(&self, reason: DisconnectReason) {
        let hook = lock(&self.shared.hooks).on_disconnect.clone();
        if let Some(hook) = hook {
            hook(self, reason);
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Write one encoded command with the current separator.
    fn transmit(&self, line: &str) -> Result<()> {
        let mut link = self.shared.link();
        if link.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let separator = link.separator;
        let Some(writer) = link.writer.as_mut() else {
            return Err(ClientError::NotConnected);
        };

        match writer.send(line, separator) {
            Ok(()) => {
                trace!(command = line, batch = separator.is_batch(), "sent");
                Ok(())
            }
            Err(err) => {
                let session = link.session;
                drop(link);
                warn!(error = %err, "send failed");
                self.teardown(DisconnectReason::ConnectionLost, Some(session));
                Err(err.into())
            }
        }
    }

    fn execute(&self, command: Command) -> Result<()> {
        let line = command.encode()?;
        self.transmit(&line)
    }

    fn register_and_send<F>(
        &self,
        command: Command,
        addr: u32,
        persistent: bool,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        let line = command.encode()?;
        self.ensure_connected()?;

        let handler = Arc::new(handler);
        let registration = if persistent {
            Registration::Subscription(handler)
        } else {
            Registration::OneShot(handler)
        };
        self.shared.registry.register(addr, registration);

        if let Err(err) = self.transmit(&line) {
            self.shared.registry.remove(addr);
            return Err(err);
        }
        Ok(())
    }

    // Batching

    /// Start collecting commands into a batch.
    ///
    /// Commands are held back until [`end_batch`](Self::end_batch), then
    /// sent together and executed by the server in one go.
    pub fn start_batch(&self) {
        self.shared.link().separator = Separator::Batch;
    }

    /// Close the batch and send it.
    pub fn end_batch(&self) -> Result<()> {
        self.shared.link().separator = Separator::Line;
        self.execute(Command::Flush)
    }

    pub fn is_batching(&self) -> bool {
        self.shared.link().separator.is_batch()
    }

    // Emulation settings

    /// Set the audio volume, 0-100.
    pub fn volume(&self, level: u8) -> Result<()> {
        self.execute(Command::Volume(level))
    }

    /// Set the emulation speed; 1.0 is normal speed.
    pub fn speed(&self, multiplier: f32) -> Result<()> {
        self.execute(Command::Speed(multiplier))
    }

    // Memory writes

    pub fn write(&self, mode: AccessMode, addr: u32, value: u32) -> Result<()> {
        self.execute(Command::Write { mode, addr, value })
    }

    pub fn write8(&self, addr: u32, value: u8) -> Result<()> {
        self.write(AccessMode::Bits8, addr, u32::from(value))
    }

    pub fn write16(&self, addr: u32, value: u16) -> Result<()> {
        self.write(AccessMode::Bits16, addr, u32::from(value))
    }

    pub fn write32(&self, addr: u32, value: u32) -> Result<()> {
        self.write(AccessMode::Bits32, addr, value)
    }

    /// Write consecutive bytes starting at `addr`.
    pub fn write_multi(&self, addr: u32, values: &[u8]) -> Result<()> {
        self.execute(Command::WriteMulti {
            addr,
            values: values.to_vec(),
        })
    }

    // Memory reads

    /// Read a value once. `handler` runs when the answer arrives.
    ///
    /// A second read or subscription on the same address replaces the
    /// first handler.
    pub fn read<F>(&self, mode: AccessMode, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_and_send(Command::Read { mode, addr }, addr, false, handler)
    }

    pub fn read8<F>(&self, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.read(AccessMode::Bits8, addr, handler)
    }

    pub fn read16<F>(&self, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.read(AccessMode::Bits16, addr, handler)
    }

    /// Read a 32-bit value. `addr` must be a multiple of 4.
    pub fn read32<F>(&self, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.read(AccessMode::Bits32, addr, handler)
    }

    // Subscriptions

    /// Call `handler` every time the value at `addr` changes.
    pub fn subscribe<F>(&self, mode: AccessMode, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_and_send(Command::Subscribe { mode, addr }, addr, true, handler)
    }

    pub fn subscribe8<F>(&self, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(AccessMode::Bits8, addr, handler)
    }

    pub fn subscribe16<F>(&self, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(AccessMode::Bits16, addr, handler)
    }

    /// Subscribe to a 32-bit value. `addr` must be a multiple of 4.
    pub fn subscribe32<F>(&self, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(AccessMode::Bits32, addr, handler)
    }

    /// Call `handler` with all `size` bytes whenever any of them changes.
    pub fn subscribe_multi<F>(&self, size: u32, addr: u32, handler: F) -> Result<()>
    where
        F: Fn(MemoryValue) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_and_send(Command::SubscribeMulti { size, addr }, addr, true, handler)
    }

    pub fn unsubscribe(&self, addr: u32) -> Result<()> {
        self.ensure_connected()?;
        self.shared.registry.remove(addr);
        self.execute(Command::Unsubscribe { addr })
    }

    pub fn unsubscribe_multi(&self, addr: u32) -> Result<()> {
        self.ensure_connected()?;
        self.shared.registry.remove(addr);
        self.execute(Command::UnsubscribeMulti { addr })
    }

    // Input

    /// Set the buttons of wiimote `index` (0-3).
    ///
    /// The server keeps the wiimote hijacked for about half a second after
    /// each call.
    pub fn wii_buttons(&self, index: u8, buttons: WiimoteButtons) -> Result<()> {
        self.execute(Command::WiiButtons { index, buttons })
    }

    /// Set the buttons and sticks of GameCube pad `index` (0-3).
    pub fn gc_buttons(&self, index: u8, buttons: GcPadButtons, sticks: StickState) -> Result<()> {
        self.execute(Command::GcButtons {
            index,
            buttons,
            sticks,
        })
    }

    // Playback

    pub fn pause(&self) -> Result<()> {
        self.execute(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.execute(Command::Resume)
    }

    pub fn reset(&self) -> Result<()> {
        self.execute(Command::Reset)
    }

    /// Stop emulation. To start another game, use [`insert`](Self::insert)
    /// followed by [`reset`](Self::reset) instead.
    pub fn stop(&self) -> Result<()> {
        self.execute(Command::Stop)
    }

    // Savestates and games

    /// Save a savestate to `filename` on the server's filesystem.
    pub fn save(&self, filename: &str) -> Result<()> {
        self.execute(Command::Save(filename.to_string()))
    }

    /// Load a savestate and wait for the server's verdict.
    ///
    /// Returns `Ok(false)` if the server reports failure or the connection
    /// drops while waiting. The server does not tag acknowledgements, so an
    /// answer still outstanding after `ack_drain_timeout` is superseded.
    pub fn load(&self, filename: &str) -> Result<bool> {
        let line = Command::Load(filename.to_string()).encode()?;
        if self.is_batching() {
            return Err(ClientError::BatchActive);
        }
        self.ensure_connected()?;

        let ack = &self.shared.ack;
        if !ack.drain(self.shared.config.ack_drain_timeout) {
            warn!("previous acknowledgement still outstanding, superseding it");
        }
        ack.arm();

        if let Err(err) = self.transmit(&line) {
            ack.fail_pending();
            return Err(err);
        }

        let timeout = self.shared.config.ack_timeout;
        match ack.wait(timeout) {
            Some(success) => {
                debug!(filename, success, "savestate load acknowledged");
                Ok(success)
            }
            None => Err(ClientError::AckTimeout(timeout.unwrap_or_default())),
        }
    }

    /// Insert a new game image. Games already running may crash if their
    /// image changes.
    pub fn insert(&self, filename: &str) -> Result<()> {
        self.execute(Command::Insert(filename.to_string()))
    }
}

impl fmt::Debug for DolphinConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (host, port) = lock(&self.shared.endpoint).clone();
        f.debug_struct("DolphinConnection")
            .field("host", &host)
            .field("port", &port)
            .field("state", &self.state())
            .field("registrations", &self.shared.registry.len())
            .finish()
    }
}

fn receive_loop(
    shared: Weak<Shared>,
    inbound: Inbound,
    mut reader: MessageReader<WatchStream>,
    session: u64,
) {
    debug!(session, "receive loop started");

    let reason = loop {
        match reader.read_message() {
            Ok(line) => {
                let current = shared
                    .upgrade()
                    .is_some_and(|shared| shared.is_current(session));
                if !current {
                    debug!(session, "receive loop outlived its session");
                    return;
                }
                inbound.route(&line);
            }
            Err(FrameError::ConnectionClosed) => break DisconnectReason::ConnectionClosedByPeer,
            Err(err) => {
                debug!(session, error = %err, "receive failed");
                break DisconnectReason::ConnectionLost;
            }
        }
    };

    if let Some(shared) = shared.upgrade() {
        DolphinConnection { shared }.teardown(reason, Some(session));
    }
    debug!(session, "receive loop stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
