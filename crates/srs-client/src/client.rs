//! Connection lifecycle manager.
//!
//! One `SyncClient` drives exactly one connection through
//! Idle → Connecting → Connected → Disconnecting → Idle. Callers create a
//! fresh instance for every attempt; reconnect policy lives above this.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use srs_core::codec::{encode_line, CodecError};
use srs_core::config::ClientConfig;
use srs_core::version::{ProtocolVersion, VersionParseError, CLIENT_VERSION};
use srs_core::wire::NetworkMessage;
use srs_session::{
    ClientEvent, ConnectionPhase, EventSink, ExternalModeError, ExternalModeState, LocalState,
    PeerRegistry, PeerState, RadioSync, ServerSettings, SharedSession, Subsystem,
};

use crate::dispatch::{DecodeBudget, Dispatcher, Flow};
use crate::idle::{shutdown_signalled, IdleWatchdog};
use crate::outbound;

/// Upper bound on a single outbound write.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(90);

const PEER_LEFT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("this client instance has already been used")]
    AlreadyStarted,
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    ExternalMode(#[from] ExternalModeError),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub idle_check_interval: Duration,
    pub minimum_version: ProtocolVersion,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            idle_check_interval: Duration::from_secs(1),
            minimum_version: ProtocolVersion::minimum(),
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &ClientConfig) -> Result<Self, VersionParseError> {
        Ok(Self {
            connect_timeout: config.network.connect_timeout(),
            idle_timeout: config.network.idle_timeout(),
            idle_check_interval: config.network.idle_check_interval(),
            minimum_version: ProtocolVersion::parse(&config.protocol.minimum_version)?,
        })
    }
}

/// The subsystems that run alongside a connection.
#[derive(Clone)]
pub struct Collaborators {
    pub radio: Arc<dyn RadioSync>,
    /// Line-of-sight / attenuation helper.
    pub auxiliary: Arc<dyn Subsystem>,
    /// Third-party controller integration.
    pub integration: Arc<dyn Subsystem>,
    pub local: Arc<dyn LocalState>,
}

struct Inner {
    guid: String,
    options: ClientOptions,
    collaborators: Collaborators,
    registry: PeerRegistry,
    settings: ServerSettings,
    session: SharedSession,
    events: EventSink,
    peer_left: broadcast::Sender<PeerState>,
    dispatcher: Dispatcher,
    writer: Mutex<Option<OwnedWriteHalf>>,
    shutdown: watch::Sender<bool>,
    address: OnceLock<String>,
    started: AtomicBool,
    torn_down: AtomicBool,
}

/// Client side of one session with a coordination server. Cheap to clone.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<Inner>,
}

impl SyncClient {
    pub fn new(
        guid: impl Into<String>,
        options: ClientOptions,
        collaborators: Collaborators,
        events: EventSink,
    ) -> Self {
        let registry = PeerRegistry::new();
        let settings = ServerSettings::new();
        let session = SharedSession::new();
        let (peer_left, _) = broadcast::channel(PEER_LEFT_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        let dispatcher = Dispatcher::new(
            registry.clone(),
            settings.clone(),
            session.clone(),
            events.clone(),
            peer_left.clone(),
            collaborators.radio.clone(),
            options.minimum_version,
        );

        Self {
            inner: Arc::new(Inner {
                guid: guid.into(),
                options,
                collaborators,
                registry,
                settings,
                session,
                events,
                peer_left,
                dispatcher,
                writer: Mutex::new(None),
                shutdown,
                address: OnceLock::new(),
                started: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn client_guid(&self) -> &str {
        &self.inner.guid
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.inner.registry
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.inner.settings
    }

    pub fn server_version(&self) -> Option<String> {
        self.inner.session.server_version()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.inner.session.phase()
    }

    pub fn external_mode(&self) -> ExternalModeState {
        self.inner.session.external_mode()
    }

    pub fn subscribe_peer_left(&self) -> broadcast::Receiver<PeerState> {
        self.inner.peer_left.subscribe()
    }

    /// Address passed to `try_connect`, empty before that.
    pub fn address(&self) -> &str {
        self.inner.address.get().map(String::as_str).unwrap_or_default()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Start connecting in the background. Must be called from within a
    /// tokio runtime. The outcome arrives as a `ConnectResult` event.
    pub fn try_connect(&self, address: impl Into<String>) -> Result<JoinHandle<()>, ConnectError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ConnectError::AlreadyStarted);
        }
        let _ = self.inner.address.set(address.into());
        self.inner.session.set_phase(ConnectionPhase::Connecting);

        let client = self.clone();
        Ok(tokio::spawn(async move { client.run().await }))
    }

    /// Tear the session down. Safe to call any number of times and from
    /// any task; only the first call has an effect.
    pub async fn disconnect(&self) {
        if !self.inner.started.load(Ordering::SeqCst) {
            return;
        }
        self.teardown(false).await;
    }

    async fn run(self) {
        let address = self.address().to_string();
        let mut shutdown = self.inner.shutdown.subscribe();

        tracing::info!(%address, "connecting");
        let stream = tokio::select! {
            _ = shutdown_signalled(&mut shutdown) => return,
            result = self.open(&address) => result,
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(%address, error = %e, "could not connect to server");
                self.teardown(true).await;
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(error = %e, "failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        *self.inner.writer.lock().await = Some(write_half);

        // Subsystems start under the session lock so a concurrent teardown
        // either sees Connected and stops them, or we see it and bail.
        let collaborators = &self.inner.collaborators;
        let connected = self.inner.session.with(|s| {
            if s.phase != ConnectionPhase::Connecting {
                return false;
            }
            s.phase = ConnectionPhase::Connected;
            s.touch();
            collaborators.radio.start();
            collaborators.auxiliary.start();
            collaborators.integration.start();
            true
        });
        if !connected {
            if let Some(mut writer) = self.inner.writer.lock().await.take() {
                let _ = writer.shutdown().await;
            }
            return;
        }
        tracing::info!(%address, "connected");

        self.spawn_idle_watchdog();
        self.inner.registry.clear();

        let local = collaborators.local.snapshot();
        if self
            .send(outbound::sync(&self.inner.guid, &local))
            .await
            .is_err()
        {
            return;
        }

        if !self.announce_connected(&address) {
            return;
        }

        if let Some(had_error) = self.read_loop(read_half, shutdown).await {
            self.teardown(had_error).await;
        }
    }

    /// Emit the success result unless teardown already began. Runs under
    /// the session lock, which teardown takes to leave `Connected`, so a
    /// failure result can never precede this one.
    fn announce_connected(&self, address: &str) -> bool {
        let events = &self.inner.events;
        self.inner.session.with(|s| {
            if s.phase != ConnectionPhase::Connected {
                return false;
            }
            events.emit(ClientEvent::ConnectResult {
                success: true,
                had_error: false,
                address: address.to_string(),
            });
            true
        })
    }

    async fn open(&self, address: &str) -> Result<TcpStream, ConnectError> {
        let timeout = self.inner.options.connect_timeout;
        match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ConnectError::Timeout(timeout)),
        }
    }

    /// Returns `Some(had_error)` when the loop ended on its own and the
    /// session still needs tearing down.
    async fn read_loop(
        &self,
        read_half: OwnedReadHalf,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<bool> {
        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::with_capacity(4096);
        let mut budget = DecodeBudget::new();

        loop {
            buf.clear();
            tokio::select! {
                _ = shutdown_signalled(&mut shutdown) => return None,

                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => {
                        tracing::info!("server closed the connection");
                        return Some(false);
                    }
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        if let Flow::Disconnect(reason) = self.inner.dispatcher.process_line(&line, &mut budget) {
                            tracing::warn!(reason = reason.as_str(), "disconnecting from server");
                            return Some(false);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "read from server failed");
                        return Some(true);
                    }
                },
            }
        }
    }

    fn spawn_idle_watchdog(&self) {
        let options = &self.inner.options;
        let watchdog = IdleWatchdog::new(
            self.inner.session.clone(),
            options.idle_timeout,
            options.idle_check_interval,
            self.inner.shutdown.subscribe(),
        );
        let client = self.clone();
        tokio::spawn(async move {
            if watchdog.run().await {
                client.teardown(false).await;
            }
        });
    }

    async fn teardown(&self, had_error: bool) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let address = self.address().to_string();
        tracing::info!(%address, had_error, "disconnecting");

        self.inner.session.set_phase(ConnectionPhase::Disconnecting);
        self.inner.shutdown.send_replace(true);

        self.inner.dispatcher.leave_external_mode();

        let collaborators = &self.inner.collaborators;
        tracing::debug!(subsystem = collaborators.radio.name(), "stopping");
        collaborators.radio.stop();
        for subsystem in [&collaborators.auxiliary, &collaborators.integration] {
            tracing::debug!(subsystem = subsystem.name(), "stopping");
            subsystem.stop();
        }

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "socket shutdown failed");
            }
        }

        self.inner.registry.clear();
        collaborators.local.reset_radio_staleness();
        self.inner.session.set_phase(ConnectionPhase::Idle);

        self.inner.events.emit(ClientEvent::ConnectResult {
            success: false,
            had_error,
            address,
        });
    }

    // ── Outbound ─────────────────────────────────────────────────────────────

    fn ensure_connected(&self) -> Result<(), SendError> {
        if self.phase() == ConnectionPhase::Connected {
            Ok(())
        } else {
            Err(SendError::NotConnected)
        }
    }

    /// Write one message. A failed write tears the session down.
    ///
    /// A write still pending when teardown starts is abandoned, releasing
    /// the writer so teardown can close the socket.
    async fn send(&self, mut message: NetworkMessage) -> Result<(), SendError> {
        message.version = Some(CLIENT_VERSION.to_string());
        let line = encode_line(&message)?;
        let mut shutdown = self.inner.shutdown.subscribe();

        let result = {
            let mut writer = self.inner.writer.lock().await;
            let writer = writer.as_mut().ok_or(SendError::NotConnected)?;
            self.inner.session.touch();
            tokio::select! {
                _ = shutdown_signalled(&mut shutdown) => return Err(SendError::NotConnected),
                written = tokio::time::timeout(SEND_TIMEOUT, writer.write_all(line.as_bytes())) => match written {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(SendError::Io(e)),
                    Err(_) => Err(SendError::Timeout(SEND_TIMEOUT)),
                },
            }
        };

        if let Err(e) = &result {
            tracing::error!(kind = %message.msg_type, error = %e, "send failed");
            self.teardown(true).await;
        } else {
            tracing::trace!(kind = %message.msg_type, "sent");
        }
        result
    }

    /// Local radio configuration changed.
    ///
    /// A connected simulator takes precedence over external mode, so this
    /// also leaves external mode if it was active.
    pub async fn send_radio_update(&self) -> Result<(), SendError> {
        self.ensure_connected()?;
        let local = &self.inner.collaborators.local;
        if local.is_game_connected() {
            self.disconnect_external_mode().await?;
        }
        let message = outbound::radio_update(
            &self.inner.guid,
            &local.snapshot(),
            self.inner.settings.needs_position(),
        );
        self.send(message).await
    }

    /// Local coalition, name or seat changed.
    pub async fn send_coalition_update(&self) -> Result<(), SendError> {
        self.ensure_connected()?;
        let message = outbound::coalition_update(
            &self.inner.guid,
            &self.inner.collaborators.local.snapshot(),
            self.inner.settings.needs_position(),
        );
        self.send(message).await
    }

    /// Ask the server for external (AWACS) mode. The verdict arrives as an
    /// `ExternalModeResult` event.
    pub async fn connect_external_mode(&self, password: &str) -> Result<(), SendError> {
        self.ensure_connected()?;
        self.inner.session.with(|s| s.external_mode.begin())?;

        let message = outbound::external_mode_password(
            &self.inner.guid,
            &self.inner.collaborators.local.snapshot(),
            password,
        );
        let result = self.send(message).await;
        if result.is_err() {
            self.inner.session.with(|s| s.external_mode.leave());
        }
        result
    }

    /// Leave external mode and tell the server. No-op when inactive.
    pub async fn disconnect_external_mode(&self) -> Result<(), SendError> {
        if !self.inner.dispatcher.leave_external_mode() {
            return Ok(());
        }
        if self.phase() != ConnectionPhase::Connected {
            return Ok(());
        }
        let message = outbound::external_mode_disconnect(
            &self.inner.guid,
            &self.inner.collaborators.local.snapshot(),
        );
        self.send(message).await
    }
}
