//! Peer registry — the roster of remote participants on this connection.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use srs_core::clock;
use srs_core::wire::{LatLngPosition, PeerRecord, RadioInfo};

/// Tracked state for one remote participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerState {
    /// Registry key. Never changes once the entry exists.
    pub client_guid: String,
    pub name: String,
    pub coalition: i32,
    pub seat: i32,
    pub position: Option<LatLngPosition>,
    pub radio: Option<RadioInfo>,
    /// Tick of the last update of any kind (see `clock::ticks`).
    pub last_update: u64,
    pub allow_record: bool,
    /// Attenuation from terrain. 0.0 = full line of sight.
    pub line_of_sight_loss: f32,
}

impl PeerState {
    /// New entry from a wire record. Starts with full line of sight so a
    /// peer stays audible when line-of-sight data never arrives.
    pub fn from_record(record: PeerRecord) -> Self {
        let now = clock::ticks();
        let radio = record.radio_info.map(|mut radio| {
            radio.last_update = now;
            radio
        });
        Self {
            client_guid: record.client_guid,
            name: record.name,
            coalition: record.coalition,
            seat: record.seat,
            position: record.lat_lng_position,
            radio,
            last_update: now,
            allow_record: record.allow_record,
            line_of_sight_loss: 0.0,
        }
    }

    /// Merge a subsequent update into this entry.
    ///
    /// Identity fields are overwritten wholesale. A missing radio payload
    /// leaves the radio untouched; with `refresh_radio_clock` it still
    /// advances the radio staleness tick.
    pub fn apply_update(&mut self, record: PeerRecord, refresh_radio_clock: bool) {
        let now = clock::ticks();
        self.last_update = now;
        self.name = record.name;
        self.coalition = record.coalition;
        self.seat = record.seat;
        self.position = record.lat_lng_position;
        self.allow_record = record.allow_record;

        match record.radio_info {
            Some(mut radio) => {
                radio.last_update = now;
                self.radio = Some(radio);
            }
            None if refresh_radio_clock => {
                if let Some(radio) = self.radio.as_mut() {
                    radio.last_update = now;
                }
            }
            None => {}
        }
    }
}

/// What `PeerRegistry::upsert` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Read by UI and collaborator threads, written by the
/// connection's read loop. Keyed on client guid.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<DashMap<String, PeerState>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a first sighting or merge into an existing entry.
    pub fn upsert(&self, record: PeerRecord, refresh_radio_clock: bool) -> UpsertOutcome {
        match self.peers.entry(record.client_guid.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().apply_update(record, refresh_radio_clock);
                UpsertOutcome::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(PeerState::from_record(record));
                UpsertOutcome::Inserted
            }
        }
    }

    /// Replace any existing entry with a fresh one (full roster sync).
    pub fn insert_fresh(&self, record: PeerRecord) {
        let guid = record.client_guid.clone();
        self.peers.insert(guid, PeerState::from_record(record));
    }

    pub fn get(&self, client_guid: &str) -> Option<PeerState> {
        self.peers.get(client_guid).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, client_guid: &str) -> Option<PeerState> {
        self.peers.remove(client_guid).map(|(_, peer)| peer)
    }

    pub fn contains(&self, client_guid: &str) -> bool {
        self.peers.contains_key(client_guid)
    }

    pub fn clear(&self) {
        self.peers.clear();
    }

    /// Copy of every entry. Order is unspecified.
    pub fn snapshot(&self) -> Vec<PeerState> {
        self.peers.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Written back by the line-of-sight collaborator. Returns false for an
    /// unknown peer.
    pub fn set_line_of_sight_loss(&self, client_guid: &str, loss: f32) -> bool {
        match self.peers.get_mut(client_guid) {
            Some(mut entry) => {
                entry.line_of_sight_loss = loss.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }
}
