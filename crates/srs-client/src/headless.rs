//! Collaborators for running without a simulator attached.
//!
//! The binary uses these to join a server as a listen-only participant
//! described entirely by the configuration file.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use srs_core::config::ClientConfig;
use srs_core::wire::RadioInfo;
use srs_session::{ClientCallbacks, LocalSnapshot, LocalState, RadioSync, Subsystem};

/// Radio sync stand-in. Reports listening once started so external mode
/// can be used from the command line.
#[derive(Debug, Default)]
pub struct HeadlessRadio {
    running: AtomicBool,
    external_loop: AtomicBool,
}

impl HeadlessRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn external_loop_running(&self) -> bool {
        self.external_loop.load(Ordering::SeqCst)
    }
}

impl Subsystem for HeadlessRadio {
    fn name(&self) -> &'static str {
        "radio-sync"
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.external_loop.store(false, Ordering::SeqCst);
    }
}

impl RadioSync for HeadlessRadio {
    fn is_listening(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start_external_mode_loop(&self) {
        tracing::info!("external mode loop started");
        self.external_loop.store(true, Ordering::SeqCst);
    }

    fn stop_external_mode_loop(&self) {
        if self.external_loop.swap(false, Ordering::SeqCst) {
            tracing::info!("external mode loop stopped");
        }
    }
}

/// A subsystem with nothing to do.
#[derive(Debug)]
pub struct Inert(pub &'static str);

impl Subsystem for Inert {
    fn name(&self) -> &'static str {
        self.0
    }

    fn start(&self) {
        tracing::debug!(subsystem = self.0, "not available in headless mode");
    }

    fn stop(&self) {}
}

/// Local participant described by configuration.
#[derive(Debug)]
pub struct ConfiguredLocal {
    snapshot: Mutex<LocalSnapshot>,
    radio_resets: AtomicU64,
}

impl ConfiguredLocal {
    pub fn from_config(config: &ClientConfig) -> Self {
        let identity = &config.identity;
        Self {
            snapshot: Mutex::new(LocalSnapshot {
                name: identity.name.clone(),
                last_seen_name: identity.name.clone(),
                coalition: identity.coalition,
                seat: identity.seat,
                radio: None,
                allow_recording: config.client.allow_recording,
                ..Default::default()
            }),
            radio_resets: AtomicU64::new(0),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut LocalSnapshot)) {
        f(&mut self.snapshot.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Times the radio snapshot has been marked stale.
    pub fn radio_resets(&self) -> u64 {
        self.radio_resets.load(Ordering::SeqCst)
    }
}

impl LocalState for ConfiguredLocal {
    fn snapshot(&self) -> LocalSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_game_connected(&self) -> bool {
        false
    }

    fn reset_radio_staleness(&self) {
        self.radio_resets.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(radio) = snapshot.radio.as_mut() {
            radio.last_update = 0;
        }
    }
}

/// Callbacks that only log.
#[derive(Debug, Default)]
pub struct LoggingCallbacks;

impl ClientCallbacks for LoggingCallbacks {
    fn on_connect_result(&mut self, success: bool, had_error: bool, address: &str) {
        if success {
            tracing::info!(%address, "connected to server");
        } else if had_error {
            tracing::error!(%address, "disconnected from server with error");
        } else {
            tracing::info!(%address, "disconnected from server");
        }
    }

    fn on_external_mode_result(&mut self, success: bool, affiliation: i32) {
        tracing::info!(success, affiliation, "external mode result");
    }

    fn on_roster_changed(&mut self) {
        tracing::debug!("roster changed");
    }

    fn on_incompatible_server(&mut self, server_version: &str, client_version: &str) {
        tracing::error!(
            server_version,
            client_version,
            "server is incompatible with this client"
        );
    }
}

/// Give the headless participant an empty radio so the server lists it.
pub fn empty_radio(unit: &str) -> RadioInfo {
    RadioInfo {
        unit: unit.to_string(),
        ..Default::default()
    }
}
