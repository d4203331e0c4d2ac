//! Per-connection session state.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::negotiation::ExternalModeState;

/// Where a connection instance is in its single traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
}

/// Mutable state negotiated over one connection.
#[derive(Debug)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    /// Version string the server last reported. None until the handshake reply.
    pub server_version: Option<String>,
    pub external_mode: ExternalModeState,
    /// Last outbound send; drives the idle timeout.
    pub last_activity: Instant,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            server_version: None,
            external_mode: ExternalModeState::Inactive,
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Session state shared between the read loop, the idle watchdog and
/// callers. Locks are held only for the duration of a closure, never
/// across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.with(|s| s.phase)
    }

    pub fn set_phase(&self, phase: ConnectionPhase) {
        self.with(|s| s.phase = phase);
    }

    pub fn server_version(&self) -> Option<String> {
        self.with(|s| s.server_version.clone())
    }

    pub fn external_mode(&self) -> ExternalModeState {
        self.with(|s| s.external_mode)
    }

    pub fn touch(&self) {
        self.with(SessionState::touch);
    }

    pub fn idle_for(&self) -> Duration {
        self.with(|s| s.idle_for())
    }
}
