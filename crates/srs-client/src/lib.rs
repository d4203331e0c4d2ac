//! srs-client — drives one connection to an SRS coordination server:
//! connect, handshake, dispatch of server messages, idle watchdog, and the
//! outbound updates the rest of the application triggers.

pub mod client;
pub mod dispatch;
pub mod headless;
pub mod idle;
pub mod outbound;

pub use client::{ClientOptions, Collaborators, ConnectError, SendError, SyncClient, SEND_TIMEOUT};
pub use dispatch::{DecodeBudget, DisconnectReason, Dispatcher, Flow, HandleError, MAX_DECODE_ERRORS};
pub use idle::IdleWatchdog;
