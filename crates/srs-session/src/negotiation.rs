//! Session negotiation — server version gate and the external (AWACS)
//! mode authentication sub-protocol.

use srs_core::version::{ProtocolVersion, VersionParseError};

// ── Version gate ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// Server did not advertise a version at all. Rejected without a notice.
    #[error("server did not advertise a protocol version")]
    Unversioned,
    #[error("server version {server:?} is not a valid version: {source}")]
    Unparseable {
        server: String,
        #[source]
        source: VersionParseError,
    },
    #[error("server version {server} is older than minimum protocol version {minimum}")]
    TooOld {
        server: ProtocolVersion,
        minimum: ProtocolVersion,
    },
}

impl VersionError {
    /// Whether the user should see an incompatibility notice.
    pub fn needs_notice(&self) -> bool {
        !matches!(self, Self::Unversioned)
    }
}

/// Gate the handshake reply on the advertised server version.
pub fn check_server_version(
    advertised: Option<&str>,
    minimum: &ProtocolVersion,
) -> Result<ProtocolVersion, VersionError> {
    let text = advertised.ok_or(VersionError::Unversioned)?;
    let server = ProtocolVersion::parse(text).map_err(|source| VersionError::Unparseable {
        server: text.to_string(),
        source,
    })?;
    if server < *minimum {
        return Err(VersionError::TooOld {
            server,
            minimum: *minimum,
        });
    }
    Ok(server)
}

// ── External mode ─────────────────────────────────────────────────────────────

/// External (AWACS) mode authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExternalModeState {
    #[default]
    Inactive,
    /// Password sent, waiting for the server's reply.
    Pending,
    Authenticated { affiliation: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExternalModeError {
    #[error("an external mode request is already pending")]
    AlreadyPending,
    #[error("external mode is already active (coalition {0})")]
    AlreadyActive(i32),
}

/// Result of applying a password reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Affiliation 0: authentication refused.
    Failed,
    Authenticated(i32),
    /// Accepted by the server, but the radio subsystem is not listening.
    /// No callback fires.
    Ignored,
}

impl ExternalModeState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }

    /// Start a password request.
    pub fn begin(&mut self) -> Result<(), ExternalModeError> {
        match *self {
            Self::Inactive => {
                *self = Self::Pending;
                Ok(())
            }
            Self::Pending => Err(ExternalModeError::AlreadyPending),
            Self::Authenticated { affiliation } => Err(ExternalModeError::AlreadyActive(affiliation)),
        }
    }

    /// Apply the server's reply to a password request.
    pub fn on_reply(&mut self, affiliation: i32, radio_listening: bool) -> ReplyOutcome {
        if affiliation == 0 {
            *self = Self::Inactive;
            ReplyOutcome::Failed
        } else if radio_listening {
            *self = Self::Authenticated { affiliation };
            ReplyOutcome::Authenticated(affiliation)
        } else {
            *self = Self::Inactive;
            ReplyOutcome::Ignored
        }
    }

    /// Drop out of external mode. Returns the previous state.
    pub fn leave(&mut self) -> ExternalModeState {
        std::mem::take(self)
    }
}
