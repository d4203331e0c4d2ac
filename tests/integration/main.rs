//! srs-client integration test harness.
//!
//! Every test runs a real `SyncClient` against an in-process mock server
//! bound to 127.0.0.1:0, so tests need no external services and can run
//! in parallel.
//!
//!   cargo test --test integration

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use srs_client::{ClientOptions, Collaborators, SyncClient};
use srs_core::codec::{decode_line, encode_line};
use srs_core::version::ProtocolVersion;
use srs_core::wire::{LatLngPosition, MessageKind, NetworkMessage, PeerRecord, RadioInfo};
use srs_session::{
    event_channel, ClientEvent, EventReceiver, LocalSnapshot, LocalState, RadioSync, Subsystem,
};

mod failures;

/// Upper bound on any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

// ── Mock server ───────────────────────────────────────────────────────────────

pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock server")?;
        Ok(Self { listener })
    }

    pub fn addr(&self) -> String {
        self.listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default()
    }

    pub async fn accept(&self) -> Result<ServerConn> {
        let (stream, _) = tokio::time::timeout(WAIT, self.listener.accept())
            .await
            .context("client never connected")??;
        let (read, write) = stream.into_split();
        Ok(ServerConn {
            reader: BufReader::new(read),
            writer: write,
        })
    }
}

/// A listener whose accept queue is already full, so new connection
/// attempts hang instead of completing. The held streams keep it full.
/// `None` when this host completes connects regardless.
pub async fn saturated_listener() -> Result<Option<(TcpListener, Vec<TcpStream>)>> {
    let socket = TcpSocket::new_v4()?;
    socket.bind("127.0.0.1:0".parse()?)?;
    let listener = socket.listen(1)?;
    let addr = listener.local_addr()?;

    let mut held = Vec::new();
    for _ in 0..64 {
        match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => held.push(stream),
            Ok(Err(_)) | Err(_) => return Ok(Some((listener, held))),
        }
    }
    Ok(None)
}

/// Server end of one accepted client connection.
pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ServerConn {
    /// Next message from the client.
    pub async fn recv(&mut self) -> Result<NetworkMessage> {
        let mut line = String::new();
        let n = tokio::time::timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .context("timed out waiting for client message")??;
        if n == 0 {
            bail!("client closed the connection");
        }
        Ok(decode_line(&line)?)
    }

    /// Next message of `kind`, skipping anything else.
    pub async fn recv_kind(&mut self, kind: MessageKind) -> Result<NetworkMessage> {
        loop {
            let msg = self.recv().await?;
            if msg.msg_type == kind {
                return Ok(msg);
            }
        }
    }

    pub async fn send(&mut self, msg: &NetworkMessage) -> Result<()> {
        self.send_raw(&encode_line(msg)?).await
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        Ok(())
    }

    /// Complete the handshake: read the client's SYNC and answer it.
    pub async fn handshake(&mut self, version: &str, peers: Vec<PeerRecord>) -> Result<NetworkMessage> {
        let hello = self.recv_kind(MessageKind::Sync).await?;
        self.send(&sync_reply(Some(version), peers)).await?;
        Ok(hello)
    }

    /// Wait until the client closes its side.
    pub async fn expect_closed(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = tokio::time::timeout(WAIT, self.reader.read_line(&mut line))
                .await
                .context("client never closed the connection")?
                .unwrap_or(0);
            if n == 0 {
                return Ok(());
            }
        }
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

pub fn peer(guid: &str) -> PeerRecord {
    PeerRecord {
        client_guid: guid.to_string(),
        name: format!("pilot {guid}"),
        coalition: 1,
        ..Default::default()
    }
}

pub fn sync_reply(version: Option<&str>, peers: Vec<PeerRecord>) -> NetworkMessage {
    let mut msg = NetworkMessage::new(MessageKind::Sync);
    msg.version = version.map(str::to_string);
    msg.clients = Some(peers);
    msg
}

pub fn settings_message(pairs: &[(&str, &str)]) -> NetworkMessage {
    let mut msg = NetworkMessage::new(MessageKind::ServerSettings);
    msg.version = Some("1.9.0.3".into());
    msg.server_settings = Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    msg
}

// ── Fake collaborators ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeSubsystem {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl Subsystem for FakeSubsystem {
    fn name(&self) -> &'static str {
        "fake"
    }
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeRadio {
    pub lifecycle: FakeSubsystem,
    pub listening: AtomicBool,
    pub external_loop: AtomicBool,
}

impl Subsystem for FakeRadio {
    fn name(&self) -> &'static str {
        "fake-radio"
    }
    fn start(&self) {
        self.lifecycle.start();
    }
    fn stop(&self) {
        self.lifecycle.stop();
    }
}

impl RadioSync for FakeRadio {
    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
    fn start_external_mode_loop(&self) {
        self.external_loop.store(true, Ordering::SeqCst);
    }
    fn stop_external_mode_loop(&self) {
        self.external_loop.store(false, Ordering::SeqCst);
    }
}

pub struct FakeLocal {
    pub snapshot: Mutex<LocalSnapshot>,
    pub game_connected: AtomicBool,
    pub radio_resets: AtomicUsize,
}

impl Default for FakeLocal {
    fn default() -> Self {
        Self {
            snapshot: Mutex::new(LocalSnapshot {
                name: String::new(),
                last_seen_name: "Springfield 1-1".into(),
                coalition: 2,
                seat: 0,
                position: LatLngPosition {
                    lat: 42.1,
                    lng: 41.7,
                    alt: 1500.0,
                },
                radio: Some(RadioInfo {
                    unit: "A-10C".into(),
                    ..Default::default()
                }),
                allow_recording: false,
            }),
            game_connected: AtomicBool::new(false),
            radio_resets: AtomicUsize::new(0),
        }
    }
}

impl LocalState for FakeLocal {
    fn snapshot(&self) -> LocalSnapshot {
        self.snapshot.lock().unwrap().clone()
    }
    fn is_game_connected(&self) -> bool {
        self.game_connected.load(Ordering::SeqCst)
    }
    fn reset_radio_staleness(&self) {
        self.radio_resets.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Client harness ────────────────────────────────────────────────────────────

pub struct Harness {
    pub client: SyncClient,
    pub events: EventReceiver,
    pub radio: Arc<FakeRadio>,
    pub auxiliary: Arc<FakeSubsystem>,
    pub integration: Arc<FakeSubsystem>,
    pub local: Arc<FakeLocal>,
}

pub fn fast_options() -> ClientOptions {
    ClientOptions {
        connect_timeout: Duration::from_secs(2),
        idle_timeout: Duration::from_secs(60),
        idle_check_interval: Duration::from_millis(20),
        minimum_version: ProtocolVersion::minimum(),
    }
}

pub fn harness(options: ClientOptions) -> Harness {
    let radio = Arc::new(FakeRadio::default());
    let auxiliary = Arc::new(FakeSubsystem::default());
    let integration = Arc::new(FakeSubsystem::default());
    let local = Arc::new(FakeLocal::default());
    let (sink, events) = event_channel();

    let client = SyncClient::new(
        "local-guid",
        options,
        Collaborators {
            radio: radio.clone(),
            auxiliary: auxiliary.clone(),
            integration: integration.clone(),
            local: local.clone(),
        },
        sink,
    );

    Harness {
        client,
        events,
        radio,
        auxiliary,
        integration,
        local,
    }
}

impl Harness {
    pub async fn next_event(&mut self) -> Result<ClientEvent> {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .context("timed out waiting for event")?
            .context("event queue closed")
    }

    /// Skip events until one matches.
    pub async fn wait_event(&mut self, pred: impl Fn(&ClientEvent) -> bool) -> Result<ClientEvent> {
        loop {
            let event = self.next_event().await?;
            if pred(&event) {
                return Ok(event);
            }
        }
    }

    /// Next connect-result event, as `(success, had_error)`.
    pub async fn connect_result(&mut self) -> Result<(bool, bool)> {
        match self
            .wait_event(|e| matches!(e, ClientEvent::ConnectResult { .. }))
            .await?
        {
            ClientEvent::ConnectResult {
                success, had_error, ..
            } => Ok((success, had_error)),
            _ => unreachable!(),
        }
    }

    /// Connect to `server` and finish the handshake.
    pub async fn connect(&mut self, server: &MockServer, peers: Vec<PeerRecord>) -> Result<ServerConn> {
        self.client.try_connect(server.addr())?;
        let mut conn = server.accept().await?;
        conn.handshake("1.9.0.3", peers).await?;
        assert_eq!(self.connect_result().await?, (true, false));
        Ok(conn)
    }
}

/// Poll `cond` until it holds or `WAIT` runs out.
pub async fn wait_for(mut cond: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            bail!("condition not met within {WAIT:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
