//! Client→server commands.

use common::{ClientId, RoomId, UserId};
use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, IceCandidate, Presentation, SessionDescription};

/// A command sent by a client over its signaling channel.
///
/// Targeted variants (`Offer`, `Answer`, `IceCandidate`) name exactly one
/// recipient; the controller delivers them to that client only. Everything
/// else is either room-scoped or addressed implicitly by the sender's own
/// membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Enter a room, creating it if this is the first join to the id.
    JoinRoom {
        room_id: RoomId,
        user_id: UserId,
        display_name: String,
    },

    /// Leave the current room voluntarily.
    LeaveRoom,

    /// Send a local offer description to one peer.
    Offer {
        target: ClientId,
        description: SessionDescription,
    },

    /// Send an answer description back to the peer that offered.
    Answer {
        target: ClientId,
        description: SessionDescription,
    },

    /// Trickle one locally discovered candidate to one peer.
    IceCandidate {
        target: ClientId,
        candidate: IceCandidate,
    },

    /// Relay a chat message to the rest of the room.
    ChatMessage { message: ChatMessage },

    /// Owner only: lock the meeting.
    LockMeeting,

    /// Owner only: unlock the meeting.
    UnlockMeeting,

    /// Owner only: end the meeting for everyone.
    EndMeeting,

    /// Owner only: start presenting a deck.
    StartPresentation { presentation: Presentation },

    /// Owner only: show a different slide.
    ChangeSlide { index: usize },

    /// Owner only: stop presenting.
    EndPresentation,
}

impl ClientCommand {
    /// Short name of the command for logging and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ClientCommand::JoinRoom { .. } => "join-room",
            ClientCommand::LeaveRoom => "leave-room",
            ClientCommand::Offer { .. } => "offer",
            ClientCommand::Answer { .. } => "answer",
            ClientCommand::IceCandidate { .. } => "ice-candidate",
            ClientCommand::ChatMessage { .. } => "chat-message",
            ClientCommand::LockMeeting => "lock-meeting",
            ClientCommand::UnlockMeeting => "unlock-meeting",
            ClientCommand::EndMeeting => "end-meeting",
            ClientCommand::StartPresentation { .. } => "start-presentation",
            ClientCommand::ChangeSlide { .. } => "change-slide",
            ClientCommand::EndPresentation => "end-presentation",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_wire_shape() {
        let cmd = ClientCommand::JoinRoom {
            room_id: RoomId::from("ABC123"),
            user_id: UserId::from("mara-4f2"),
            display_name: "Mara".into(),
        };

        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "join-room");
        assert_eq!(json["room_id"], "ABC123");
        assert_eq!(json["display_name"], "Mara");
    }

    #[test]
    fn test_targeted_command_carries_target() {
        let target = ClientId::new();
        let cmd = ClientCommand::IceCandidate {
            target,
            candidate: IceCandidate {
                candidate: "candidate:0 1 udp 1 198.51.100.7 9 typ host".into(),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
            },
        };

        let json = serde_json::to_string(&cmd).unwrap();
        let back: ClientCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ClientCommand::IceCandidate { target: t, .. } if t == target));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(ClientCommand::LockMeeting.name(), "lock-meeting");
        assert_eq!(ClientCommand::EndPresentation.name(), "end-presentation");
    }
}
