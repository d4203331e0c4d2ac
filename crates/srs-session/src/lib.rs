//! srs-session — state owned by one client connection: the peer roster,
//! server settings, negotiated session state, and the seams to the rest
//! of the application.

pub mod collaborator;
pub mod events;
pub mod negotiation;
pub mod peer;
pub mod session;
pub mod settings;

pub use collaborator::{LocalSnapshot, LocalState, RadioSync, Subsystem};
pub use events::{
    event_channel, spawn_callback_thread, ClientCallbacks, ClientEvent, EventReceiver, EventSink,
};
pub use negotiation::{
    check_server_version, ExternalModeError, ExternalModeState, ReplyOutcome, VersionError,
};
pub use peer::{PeerRegistry, PeerState, UpsertOutcome};
pub use session::{ConnectionPhase, SessionState, SharedSession};
pub use settings::{ServerSettingKey, ServerSettings};
