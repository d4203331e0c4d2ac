//! Collaborator traits for the subsystems that run alongside a connection.
//!
//! The session layer never reaches into simulator, audio or UI state
//! directly. Everything it needs from the rest of the application comes
//! through these traits.

use srs_core::wire::{LatLngPosition, RadioInfo};

/// A subsystem started and stopped in lockstep with the connection.
pub trait Subsystem: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn start(&self);

    /// Must tolerate being called when already stopped or never started.
    fn stop(&self);
}

/// The radio-state sync subsystem.
pub trait RadioSync: Subsystem {
    /// Whether the local simulator bridge is receiving radio state.
    fn is_listening(&self) -> bool;

    fn start_external_mode_loop(&self);

    fn stop_external_mode_loop(&self);
}

/// Read-only view of the local participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSnapshot {
    pub name: String,
    /// Name last seen from the simulator, used when `name` is empty.
    pub last_seen_name: String,
    pub coalition: i32,
    pub seat: i32,
    pub position: LatLngPosition,
    pub radio: Option<RadioInfo>,
    pub allow_recording: bool,
}

impl LocalSnapshot {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.last_seen_name
        } else {
            &self.name
        }
    }
}

/// Provider of local participant state.
pub trait LocalState: Send + Sync {
    fn snapshot(&self) -> LocalSnapshot;

    /// True while a simulator is connected locally.
    fn is_game_connected(&self) -> bool;

    /// Mark the local radio snapshot stale after disconnecting.
    fn reset_radio_staleness(&self);
}
