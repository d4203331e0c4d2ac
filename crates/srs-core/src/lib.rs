//! srs-core — wire types, line codec, protocol versions and configuration.
//! All other SRS crates depend on this one.

pub mod clock;
pub mod codec;
pub mod config;
pub mod version;
pub mod wire;

pub use codec::{decode_line, encode_line, CodecError};
pub use version::{ProtocolVersion, VersionParseError, CLIENT_VERSION, MINIMUM_PROTOCOL_VERSION};
pub use wire::{LatLngPosition, MessageKind, NetworkMessage, PeerRecord, Radio, RadioInfo};
