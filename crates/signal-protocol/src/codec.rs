//! Wire codec for signaling messages.
//!
//! The protocol is line-oriented JSON: one serialized command or event per
//! text frame. Decoding failures carry the offending type tag where one
//! could be read, so transports can log rejects without guessing.

use thiserror::Error;
use tracing::debug;

use crate::{ClientCommand, ServerEvent};

/// Codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame was not valid JSON or did not match any known message.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A message failed to serialize (indicates a bug in the payload types).
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Encode a client command as a JSON text frame.
pub fn encode_command(command: &ClientCommand) -> Result<String, CodecError> {
    serde_json::to_string(command).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a client command from a JSON text frame.
pub fn decode_command(frame: &str) -> Result<ClientCommand, CodecError> {
    serde_json::from_str(frame).map_err(|e| {
        debug!(target: "hud.protocol", error = %e, "Rejected inbound command frame");
        CodecError::Malformed(e.to_string())
    })
}

/// Encode a server event as a JSON text frame.
pub fn encode_event(event: &ServerEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a server event from a JSON text frame.
pub fn decode_event(frame: &str) -> Result<ServerEvent, CodecError> {
    serde_json::from_str(frame).map_err(|e| {
        debug!(target: "hud.protocol", error = %e, "Rejected inbound event frame");
        CodecError::Malformed(e.to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_round_trip() {
        let frame = encode_command(&ClientCommand::EndMeeting).unwrap();
        assert_eq!(frame, r#"{"type":"end-meeting"}"#);
        assert_eq!(decode_command(&frame).unwrap(), ClientCommand::EndMeeting);
    }

    #[test]
    fn test_unknown_type_tag_is_malformed() {
        let result = decode_command(r#"{"type":"raise-hand"}"#);
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_garbage_frame_is_malformed() {
        assert!(matches!(
            decode_event("not json"),
            Err(CodecError::Malformed(_))
        ));
    }
}
