//! Protocol version strings (`major.minor[.build[.revision]]`).

use std::fmt;
use std::str::FromStr;

/// Version this client advertises on every message.
pub const CLIENT_VERSION: &str = "1.9.0.3";

/// Oldest server protocol this client can talk to.
pub const MINIMUM_PROTOCOL_VERSION: &str = "1.9.0.0";

/// Structured version. A missing component sorts below an explicit zero,
/// so `1.9` < `1.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub build: Option<u32>,
    pub revision: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("version {0:?} must have 2 to 4 components")]
    ComponentCount(String),
    #[error("version {0:?} has a non-numeric component")]
    NotNumeric(String),
}

impl ProtocolVersion {
    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        let parts: Vec<&str> = text.trim().split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(VersionParseError::ComponentCount(text.to_string()));
        }
        let mut nums = Vec::with_capacity(parts.len());
        for part in &parts {
            let n = part
                .parse::<u32>()
                .map_err(|_| VersionParseError::NotNumeric(text.to_string()))?;
            nums.push(n);
        }
        Ok(Self {
            major: nums[0],
            minor: nums[1],
            build: nums.get(2).copied(),
            revision: nums.get(3).copied(),
        })
    }

    /// The compiled-in minimum.
    pub fn minimum() -> Self {
        Self::parse(MINIMUM_PROTOCOL_VERSION).expect("MINIMUM_PROTOCOL_VERSION is well-formed")
    }
}

impl FromStr for ProtocolVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        Ok(())
    }
}
