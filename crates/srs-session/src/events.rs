//! Outward-facing notifications.
//!
//! Any task may emit; exactly one consumer receives. Callbacks therefore
//! always run on whichever thread owns the `EventReceiver`.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connection established (`success`) or torn down (`!success`).
    ConnectResult {
        success: bool,
        had_error: bool,
        address: String,
    },
    ExternalModeResult {
        success: bool,
        affiliation: i32,
    },
    /// The roster changed; consumers re-read the peer registry.
    RosterChanged,
    /// The server cannot talk to this client. Shown to the user.
    Incompatible {
        server_version: String,
        client_version: String,
    },
}

/// Sending side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

/// Receiving side. Owned by the designated callback thread.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
}

pub fn event_channel() -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, EventReceiver { rx })
}

impl EventSink {
    /// Queue an event. A closed queue is logged, never propagated.
    pub fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(event = ?e.0, "callback queue closed, dropping event");
        }
    }
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.rx.try_recv().ok()
    }

    /// Blocking receive for a dedicated OS thread. Must not be called from
    /// inside an async context.
    pub fn blocking_recv(&mut self) -> Option<ClientEvent> {
        self.rx.blocking_recv()
    }
}

/// Application callbacks. All methods default to doing nothing.
pub trait ClientCallbacks: Send {
    fn on_connect_result(&mut self, _success: bool, _had_error: bool, _address: &str) {}

    fn on_external_mode_result(&mut self, _success: bool, _affiliation: i32) {}

    fn on_roster_changed(&mut self) {}

    fn on_incompatible_server(&mut self, _server_version: &str, _client_version: &str) {}
}

/// Route one event to the matching callback.
pub fn deliver(callbacks: &mut dyn ClientCallbacks, event: &ClientEvent) {
    match event {
        ClientEvent::ConnectResult {
            success,
            had_error,
            address,
        } => callbacks.on_connect_result(*success, *had_error, address),
        ClientEvent::ExternalModeResult {
            success,
            affiliation,
        } => callbacks.on_external_mode_result(*success, *affiliation),
        ClientEvent::RosterChanged => callbacks.on_roster_changed(),
        ClientEvent::Incompatible {
            server_version,
            client_version,
        } => callbacks.on_incompatible_server(server_version, client_version),
    }
}

/// Run `callbacks` on a dedicated thread until every `EventSink` is dropped.
///
/// A panicking callback is logged and the thread keeps consuming.
pub fn spawn_callback_thread<C>(
    mut receiver: EventReceiver,
    mut callbacks: C,
) -> std::io::Result<thread::JoinHandle<()>>
where
    C: ClientCallbacks + 'static,
{
    thread::Builder::new()
        .name("srs-callbacks".into())
        .spawn(move || {
            while let Some(event) = receiver.blocking_recv() {
                let result = panic::catch_unwind(AssertUnwindSafe(|| deliver(&mut callbacks, &event)));
                if result.is_err() {
                    tracing::error!(event = ?event, "callback panicked");
                }
            }
            tracing::debug!("callback thread exiting");
        })
}
