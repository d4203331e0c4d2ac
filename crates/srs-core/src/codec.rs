//! Line codec: one JSON record per newline-terminated line.

use crate::wire::NetworkMessage;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty line")]
    Empty,
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a message as a single line, including the trailing `\n`.
///
/// JSON string escaping guarantees the payload itself never contains a raw
/// newline, so the line boundary is unambiguous.
pub fn encode_line(message: &NetworkMessage) -> Result<String, CodecError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line (with or without its terminator).
pub fn decode_line(line: &str) -> Result<NetworkMessage, CodecError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(serde_json::from_str(trimmed)?)
}
