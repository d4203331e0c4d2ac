//! Builders for the messages this client sends.
//!
//! All of them describe the local participant from a `LocalSnapshot`.
//! `Version` is stamped at send time, not here.

use srs_core::wire::{MessageKind, NetworkMessage, PeerRecord};
use srs_session::LocalSnapshot;

fn base_record(guid: &str, local: &LocalSnapshot) -> PeerRecord {
    PeerRecord {
        client_guid: guid.to_string(),
        name: local.name.clone(),
        coalition: local.coalition,
        seat: local.seat,
        allow_record: local.allow_recording,
        ..Default::default()
    }
}

/// Handshake. Always carries position and radio so the server can place
/// us immediately.
pub fn sync(guid: &str, local: &LocalSnapshot) -> NetworkMessage {
    let mut client = base_record(guid, local);
    client.name = local.display_name().to_string();
    client.lat_lng_position = Some(local.position);
    client.radio_info = local.radio.clone();
    NetworkMessage::with_client(MessageKind::Sync, client)
}

/// Radio configuration changed.
pub fn radio_update(guid: &str, local: &LocalSnapshot, include_position: bool) -> NetworkMessage {
    let mut client = base_record(guid, local);
    client.radio_info = local.radio.clone();
    if include_position {
        client.lat_lng_position = Some(local.position);
    }
    NetworkMessage::with_client(MessageKind::RadioUpdate, client)
}

/// Coalition, name or seat changed. No radio payload.
pub fn coalition_update(guid: &str, local: &LocalSnapshot, include_position: bool) -> NetworkMessage {
    let mut client = base_record(guid, local);
    if include_position {
        client.lat_lng_position = Some(local.position);
    }
    NetworkMessage::with_client(MessageKind::Update, client)
}

pub fn external_mode_password(guid: &str, local: &LocalSnapshot, password: &str) -> NetworkMessage {
    let mut client = base_record(guid, local);
    client.seat = 0;
    client.lat_lng_position = Some(local.position);
    let mut msg = NetworkMessage::with_client(MessageKind::ExternalAwacsModePassword, client);
    msg.external_awacs_mode_password = Some(password.to_string());
    msg
}

pub fn external_mode_disconnect(guid: &str, local: &LocalSnapshot) -> NetworkMessage {
    NetworkMessage::with_client(MessageKind::ExternalAwacsModeDisconnect, base_record(guid, local))
}
