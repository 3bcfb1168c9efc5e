//! Server→client events.

use common::ClientId;
use serde::{Deserialize, Serialize};

use crate::types::{
    ChatMessage, DepartedParticipant, IceCandidate, PeerInfo, SessionDescription, Slide,
};

/// An event delivered to a client over its signaling channel.
///
/// Handshake relays (`OfferReceived`, `AnswerReceived`,
/// `IceCandidateReceived`) and `YouAreOwner` are unicast to exactly one
/// client; the remaining variants are room broadcasts excluding the client
/// that caused them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// The recipient holds the owner role (sent on first join and on
    /// re-election after the previous owner departs).
    YouAreOwner,

    /// Membership snapshot handed to a joining client, taken before anyone
    /// else learns of the join. Never includes the recipient itself.
    ExistingParticipants { participants: Vec<PeerInfo> },

    /// Someone else entered the room.
    ParticipantJoined { participant: PeerInfo },

    /// Someone else left the room or lost its transport.
    ParticipantLeft { participant: DepartedParticipant },

    /// A peer wants to open a media connection with the recipient.
    OfferReceived {
        description: SessionDescription,
        from: ClientId,
        from_display_name: String,
    },

    /// A peer accepted the recipient's offer.
    AnswerReceived {
        description: SessionDescription,
        from: ClientId,
    },

    /// A peer trickled a connectivity candidate to the recipient.
    IceCandidateReceived {
        candidate: IceCandidate,
        from: ClientId,
    },

    /// Chat relayed from another participant.
    ChatMessage { message: ChatMessage },

    /// The owner locked the meeting.
    MeetingLocked,

    /// The owner unlocked the meeting.
    MeetingUnlocked,

    /// The owner ended the meeting; the channel closes right after this.
    MeetingEnded,

    /// The owner started presenting.
    PresentationStarted {
        slides: Vec<Slide>,
        current_slide: usize,
        total_slides: usize,
    },

    /// The owner moved to another slide.
    SlideChanged { index: usize, slide_url: String },

    /// The owner stopped presenting.
    PresentationEnded,
}

impl ServerEvent {
    /// Short name of the event for logging and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerEvent::YouAreOwner => "you-are-owner",
            ServerEvent::ExistingParticipants { .. } => "existing-participants",
            ServerEvent::ParticipantJoined { .. } => "participant-joined",
            ServerEvent::ParticipantLeft { .. } => "participant-left",
            ServerEvent::OfferReceived { .. } => "offer-received",
            ServerEvent::AnswerReceived { .. } => "answer-received",
            ServerEvent::IceCandidateReceived { .. } => "ice-candidate-received",
            ServerEvent::ChatMessage { .. } => "chat-message",
            ServerEvent::MeetingLocked => "meeting-locked",
            ServerEvent::MeetingUnlocked => "meeting-unlocked",
            ServerEvent::MeetingEnded => "meeting-ended",
            ServerEvent::PresentationStarted { .. } => "presentation-started",
            ServerEvent::SlideChanged { .. } => "slide-changed",
            ServerEvent::PresentationEnded => "presentation-ended",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_event_wire_shape() {
        let json = serde_json::to_value(&ServerEvent::MeetingLocked).unwrap();
        assert_eq!(json["type"], "meeting-locked");
    }

    #[test]
    fn test_slide_changed_round_trip() {
        let event = ServerEvent::SlideChanged {
            index: 2,
            slide_url: "/uploads/slide-2.png".into(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_offer_received_names_sender() {
        let from = ClientId::new();
        let event = ServerEvent::OfferReceived {
            description: SessionDescription::new("v=0\r\n"),
            from,
            from_display_name: "Noor".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "offer-received");
        assert_eq!(json["from_display_name"], "Noor");
    }
}
