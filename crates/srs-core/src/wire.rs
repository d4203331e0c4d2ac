//! SRS wire format — the JSON records exchanged with the coordination server.
//!
//! One `NetworkMessage` per line. Field names are PascalCase on the envelope
//! and peer record, camelCase inside radio payloads, matching what deployed
//! servers emit. Unknown radio fields are carried through untouched.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Message kind ──────────────────────────────────────────────────────────────

/// Message discriminator, encoded as a number on the wire.
///
/// Numbers this client does not know decode as `Unknown` instead of failing,
/// so newer servers can add kinds without breaking the read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum MessageKind {
    Update,
    Ping,
    Sync,
    RadioUpdate,
    ServerSettings,
    ClientDisconnect,
    VersionMismatch,
    ExternalAwacsModePassword,
    ExternalAwacsModeDisconnect,
    Unknown(u8),
}

impl From<u8> for MessageKind {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Update,
            1 => Self::Ping,
            2 => Self::Sync,
            3 => Self::RadioUpdate,
            4 => Self::ServerSettings,
            5 => Self::ClientDisconnect,
            6 => Self::VersionMismatch,
            7 => Self::ExternalAwacsModePassword,
            8 => Self::ExternalAwacsModeDisconnect,
            other => Self::Unknown(other),
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Update => 0,
            MessageKind::Ping => 1,
            MessageKind::Sync => 2,
            MessageKind::RadioUpdate => 3,
            MessageKind::ServerSettings => 4,
            MessageKind::ClientDisconnect => 5,
            MessageKind::VersionMismatch => 6,
            MessageKind::ExternalAwacsModePassword => 7,
            MessageKind::ExternalAwacsModeDisconnect => 8,
            MessageKind::Unknown(other) => other,
        }
    }
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Ping => "PING",
            Self::Sync => "SYNC",
            Self::RadioUpdate => "RADIO_UPDATE",
            Self::ServerSettings => "SERVER_SETTINGS",
            Self::ClientDisconnect => "CLIENT_DISCONNECT",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::ExternalAwacsModePassword => "EXTERNAL_AWACS_MODE_PASSWORD",
            Self::ExternalAwacsModeDisconnect => "EXTERNAL_AWACS_MODE_DISCONNECT",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(n) => write!(f, "UNKNOWN({n})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// One line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkMessage {
    /// Single peer payload (UPDATE, RADIO_UPDATE, CLIENT_DISCONNECT, password replies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<PeerRecord>,

    pub msg_type: MessageKind,

    /// Full roster (SYNC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<PeerRecord>>,

    /// Server-wide settings blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_settings: Option<HashMap<String, String>>,

    #[serde(
        rename = "ExternalAWACSModePassword",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub external_awacs_mode_password: Option<String>,

    /// Sender version string. Stamped by the client on every send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl NetworkMessage {
    /// Bare message of the given kind.
    pub fn new(msg_type: MessageKind) -> Self {
        Self {
            client: None,
            msg_type,
            clients: None,
            server_settings: None,
            external_awacs_mode_password: None,
            version: None,
        }
    }

    pub fn with_client(msg_type: MessageKind, client: PeerRecord) -> Self {
        Self {
            client: Some(client),
            ..Self::new(msg_type)
        }
    }
}

// ── Peer record ───────────────────────────────────────────────────────────────

/// A participant as described on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeerRecord {
    pub client_guid: String,

    #[serde(default)]
    pub name: String,

    /// Side affiliation. 0 = spectator, 1 = red, 2 = blue.
    #[serde(default)]
    pub coalition: i32,

    #[serde(default)]
    pub seat: i32,

    #[serde(default)]
    pub allow_record: bool,

    /// Absent means "no change" on RADIO_UPDATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_info: Option<RadioInfo>,

    /// Only sent when the server has distance or line-of-sight enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat_lng_position: Option<LatLngPosition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLngPosition {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
    #[serde(default)]
    pub alt: f64,
}

// ── Radio payload ─────────────────────────────────────────────────────────────

/// Radio configuration snapshot for one participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioInfo {
    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub unit_id: u32,

    #[serde(default)]
    pub radios: Vec<Radio>,

    #[serde(default)]
    pub ptt: bool,

    #[serde(default)]
    pub selected: i16,

    /// Fields this client does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Staleness tick (see `clock::ticks`). Local only. 0 = stale.
    #[serde(skip)]
    pub last_update: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Radio {
    #[serde(default)]
    pub name: String,

    /// Hz.
    #[serde(default)]
    pub freq: f64,

    #[serde(default)]
    pub sec_freq: f64,

    #[serde(default)]
    pub modulation: i32,

    #[serde(default)]
    pub enc: bool,

    #[serde(default)]
    pub enc_key: u8,

    #[serde(default)]
    pub volume: f32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
