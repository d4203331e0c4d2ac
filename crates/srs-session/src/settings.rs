//! Server-wide settings pushed by the coordination server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// Settings the client acts on. The server may send many more; those are
/// kept and readable through `ServerSettings::get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerSettingKey {
    CoalitionAudioSecurity,
    SpectatorsAudioDisabled,
    ClientExportEnabled,
    LosEnabled,
    DistanceEnabled,
    IrlRadioTx,
    IrlRadioRxInterference,
    RadioExpansion,
    ExternalAwacsMode,
    AllowRadioEncryption,
    ServerRecording,
}

impl ServerSettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoalitionAudioSecurity => "COALITION_AUDIO_SECURITY",
            Self::SpectatorsAudioDisabled => "SPECTATORS_AUDIO_DISABLED",
            Self::ClientExportEnabled => "CLIENT_EXPORT_ENABLED",
            Self::LosEnabled => "LOS_ENABLED",
            Self::DistanceEnabled => "DISTANCE_ENABLED",
            Self::IrlRadioTx => "IRL_RADIO_TX",
            Self::IrlRadioRxInterference => "IRL_RADIO_RX_INTERFERENCE",
            Self::RadioExpansion => "RADIO_EXPANSION",
            Self::ExternalAwacsMode => "EXTERNAL_AWACS_MODE",
            Self::AllowRadioEncryption => "ALLOW_RADIO_ENCRYPTION",
            Self::ServerRecording => "SERVER_RECORDING",
        }
    }
}

/// Latest settings blob from the server. Cheap to clone; clones share state.
///
/// A refresh swaps the whole map at once, so readers see either the old
/// blob or the new one, never a mix.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl ServerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole blob with what the server just sent.
    pub fn decode(&self, blob: &HashMap<String, String>) {
        let fresh = blob.clone();
        *self.values.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        tracing::debug!(count = blob.len(), "server settings refreshed");
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    /// Boolean flag lookup. Missing or unparseable values read as false.
    pub fn get_bool(&self, key: ServerSettingKey) -> bool {
        flag(&self.read(), key)
    }

    /// Whether outbound updates need a real position.
    pub fn needs_position(&self) -> bool {
        let values = self.read();
        flag(&values, ServerSettingKey::DistanceEnabled) || flag(&values, ServerSettingKey::LosEnabled)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

fn flag(values: &HashMap<String, String>, key: ServerSettingKey) -> bool {
    values
        .get(key.as_str())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
