//! Applies incoming server messages to the roster and session state.
//!
//! Runs on the connection's read task, one line at a time, in arrival
//! order. Never touches the socket: anything that must end the session is
//! reported back as `Flow::Disconnect`.

use std::sync::Arc;

use tokio::sync::broadcast;

use srs_core::codec::decode_line;
use srs_core::version::{ProtocolVersion, CLIENT_VERSION};
use srs_core::wire::{MessageKind, NetworkMessage};
use srs_session::{
    check_server_version, ClientEvent, EventSink, ExternalModeState, PeerRegistry, PeerState,
    RadioSync, ReplyOutcome, ServerSettingKey, ServerSettings, SharedSession,
};

/// Consecutive bad lines tolerated before the stream is declared incompatible.
pub const MAX_DECODE_ERRORS: u32 = 5;

/// What the read loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Disconnect(DisconnectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    UnversionedServer,
    IncompatibleVersion,
    VersionMismatch,
    TooManyDecodeErrors,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnversionedServer => "unversioned server",
            Self::IncompatibleVersion => "server version below minimum",
            Self::VersionMismatch => "server reported version mismatch",
            Self::TooManyDecodeErrors => "too many undecodable messages",
        }
    }
}

/// A message decoded fine but could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("{0} message without a client payload")]
    MissingClient(MessageKind),
}

/// Counts consecutive failures on the inbound stream.
///
/// A structurally valid line resets the count; a decode failure or a
/// failure applying a decoded message increments it.
#[derive(Debug, Default)]
pub struct DecodeBudget {
    consecutive: u32,
}

impl DecodeBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Record a failure. Returns true once the threshold is reached.
    pub fn fail(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= MAX_DECODE_ERRORS
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Message dispatcher for one connection.
pub struct Dispatcher {
    registry: PeerRegistry,
    settings: ServerSettings,
    session: SharedSession,
    events: EventSink,
    peer_left: broadcast::Sender<PeerState>,
    radio: Arc<dyn RadioSync>,
    minimum_version: ProtocolVersion,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: PeerRegistry,
        settings: ServerSettings,
        session: SharedSession,
        events: EventSink,
        peer_left: broadcast::Sender<PeerState>,
        radio: Arc<dyn RadioSync>,
        minimum_version: ProtocolVersion,
    ) -> Self {
        Self {
            registry,
            settings,
            session,
            events,
            peer_left,
            radio,
            minimum_version,
        }
    }

    /// Decode and apply one raw line.
    pub fn process_line(&self, line: &str, budget: &mut DecodeBudget) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }

        let result = match decode_line(line) {
            Ok(message) => {
                budget.reset();
                self.handle(message).map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(flow) => flow,
            Err(error) => {
                let exhausted = budget.fail();
                tracing::error!(
                    %error,
                    consecutive = budget.consecutive(),
                    "failed to process message from server"
                );
                if exhausted {
                    self.notify_incompatible("unknown");
                    Flow::Disconnect(DisconnectReason::TooManyDecodeErrors)
                } else {
                    Flow::Continue
                }
            }
        }
    }

    /// Apply one decoded message.
    pub fn handle(&self, message: NetworkMessage) -> Result<Flow, HandleError> {
        tracing::trace!(kind = %message.msg_type, "received");

        match message.msg_type {
            MessageKind::Ping => {}

            MessageKind::Update | MessageKind::RadioUpdate => {
                let refresh_radio_clock = message.msg_type == MessageKind::RadioUpdate;
                let client = message
                    .client
                    .ok_or(HandleError::MissingClient(message.msg_type))?;
                if let Some(blob) = &message.server_settings {
                    self.settings.decode(blob);
                }
                let guid = client.client_guid.clone();
                let outcome = self.registry.upsert(client, refresh_radio_clock);
                tracing::debug!(peer = %guid, ?outcome, "peer updated");

                self.apply_external_mode_rule();
                self.events.emit(ClientEvent::RosterChanged);
            }

            MessageKind::Sync => {
                if let Err(e) = check_server_version(message.version.as_deref(), &self.minimum_version) {
                    if e.needs_notice() {
                        tracing::error!(error = %e, "disconnecting incompatible server");
                        self.notify_incompatible(message.version.as_deref().unwrap_or("unknown"));
                        return Ok(Flow::Disconnect(DisconnectReason::IncompatibleVersion));
                    }
                    tracing::error!("disconnecting unversioned server");
                    return Ok(Flow::Disconnect(DisconnectReason::UnversionedServer));
                }
                self.session.with(|s| s.server_version = message.version.clone());

                let clients = message.clients.unwrap_or_default();
                let count = clients.len();
                for client in clients {
                    self.registry.insert_fresh(client);
                }
                if let Some(blob) = &message.server_settings {
                    self.settings.decode(blob);
                }
                tracing::info!(
                    peers = count,
                    server_version = message.version.as_deref().unwrap_or_default(),
                    "roster synchronized"
                );

                self.apply_external_mode_rule();
                self.events.emit(ClientEvent::RosterChanged);
            }

            MessageKind::ServerSettings => {
                if let Some(blob) = &message.server_settings {
                    self.settings.decode(blob);
                }
                self.session.with(|s| s.server_version = message.version.clone());

                self.apply_external_mode_rule();
                self.events.emit(ClientEvent::RosterChanged);
            }

            MessageKind::ClientDisconnect => {
                let client = message
                    .client
                    .ok_or(HandleError::MissingClient(message.msg_type))?;
                if let Some(peer) = self.registry.remove(&client.client_guid) {
                    tracing::debug!(peer = %peer.client_guid, name = %peer.name, "peer left");
                    // No subscribers is fine.
                    let _ = self.peer_left.send(peer);
                }
            }

            MessageKind::VersionMismatch => {
                let server_version = message.version.as_deref().unwrap_or("unknown");
                tracing::error!(
                    client_version = CLIENT_VERSION,
                    server_version,
                    "version mismatch between client and server, disconnecting"
                );
                self.notify_incompatible(server_version);
                return Ok(Flow::Disconnect(DisconnectReason::VersionMismatch));
            }

            MessageKind::ExternalAwacsModePassword => {
                let client = message
                    .client
                    .ok_or(HandleError::MissingClient(message.msg_type))?;
                self.handle_password_reply(client.coalition);
            }

            other => {
                tracing::warn!(kind = %other, "ignoring unsupported message");
            }
        }

        Ok(Flow::Continue)
    }

    fn handle_password_reply(&self, affiliation: i32) {
        let listening = self.radio.is_listening();
        let outcome = self.session.with(|s| s.external_mode.on_reply(affiliation, listening));

        match outcome {
            ReplyOutcome::Failed => {
                tracing::info!("external AWACS mode authentication failed");
                self.events.emit(ClientEvent::ExternalModeResult {
                    success: false,
                    affiliation: 0,
                });
            }
            ReplyOutcome::Authenticated(affiliation) => {
                tracing::info!(
                    coalition = if affiliation == 1 { "red" } else { "blue" },
                    "external AWACS mode authentication succeeded"
                );
                self.events.emit(ClientEvent::ExternalModeResult {
                    success: true,
                    affiliation,
                });
                self.radio.start_external_mode_loop();
            }
            ReplyOutcome::Ignored => {
                tracing::debug!("external AWACS mode accepted but radio is not listening, ignoring");
            }
        }
    }

    /// Leave external mode if the server no longer allows it.
    fn apply_external_mode_rule(&self) {
        let active = self.session.external_mode().is_active();
        if active && !self.settings.get_bool(ServerSettingKey::ExternalAwacsMode) {
            tracing::info!("external AWACS mode disabled by server");
            self.leave_external_mode();
        }
    }

    /// Drop out of external mode. Returns true if it was active.
    ///
    /// Only a previously authenticated session stops the radio loop and
    /// reports `ExternalModeResult(false, 0)`.
    pub fn leave_external_mode(&self) -> bool {
        let previous = self.session.with(|s| s.external_mode.leave());
        match previous {
            ExternalModeState::Inactive => false,
            ExternalModeState::Pending => true,
            ExternalModeState::Authenticated { .. } => {
                self.radio.stop_external_mode_loop();
                self.events.emit(ClientEvent::ExternalModeResult {
                    success: false,
                    affiliation: 0,
                });
                true
            }
        }
    }

    fn notify_incompatible(&self, server_version: &str) {
        self.events.emit(ClientEvent::Incompatible {
            server_version: server_version.to_string(),
            client_version: CLIENT_VERSION.to_string(),
        });
    }
}
