//! Shared payload types carried by commands and events.

use chrono::{DateTime, Utc};
use common::{ClientId, UserId};
use serde::{Deserialize, Serialize};

/// An SDP session description produced by one side of a peer negotiation.
///
/// The controller relays these opaquely; only the two endpoints of a peer
/// pair ever parse the SDP text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Raw SDP text.
    pub sdp: String,
}

impl SessionDescription {
    /// Wrap raw SDP text.
    #[must_use]
    pub fn new(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into() }
    }
}

/// A single trickled ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate line as produced by the local agent.
    pub candidate: String,
    /// Media-section identifier the candidate belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Media-section index the candidate belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

/// Roster entry sent to a joining client and broadcast on join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Transport-session identity used for addressed delivery.
    pub client_id: ClientId,
    /// Name shown on the participant's tile.
    pub display_name: String,
}

/// A chat message, relayed verbatim and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the sender.
    pub sender_name: String,
    /// Message body.
    pub text: String,
    /// Wall-clock send time, stamped by the sender.
    pub sent_at: DateTime<Utc>,
}

/// One slide of a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// Where the rendered slide image is served from.
    pub url: String,
    /// Zero-based position in the deck.
    pub index: usize,
}

/// A presentation deck as submitted by the owner.
///
/// `current_slide` is owner-controlled state; the controller resets it to
/// zero when a presentation starts regardless of what the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    /// Ordered slides.
    pub slides: Vec<Slide>,
    /// Speaker notes, parallel to `slides` where present.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Currently shown slide index.
    #[serde(default)]
    pub current_slide: usize,
}

impl Presentation {
    /// Number of slides in the deck.
    #[must_use]
    pub fn total_slides(&self) -> usize {
        self.slides.len()
    }

    /// Look up a slide's URL by index.
    #[must_use]
    pub fn slide_url(&self, index: usize) -> Option<&str> {
        self.slides.get(index).map(|s| s.url.as_str())
    }
}

/// Payload of the departure broadcast.
///
/// Carries both identities so observers can tear down the peer connection
/// (keyed by `client_id`) and update user-facing state (keyed by `user_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartedParticipant {
    /// Transport-session identity of the departed client.
    pub client_id: ClientId,
    /// Stable identity of the departed user.
    pub user_id: UserId,
    /// Name the participant was shown under.
    pub display_name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_presentation_slide_lookup() {
        let deck = Presentation {
            slides: vec![
                Slide { url: "/uploads/a.png".into(), index: 0 },
                Slide { url: "/uploads/b.png".into(), index: 1 },
            ],
            notes: vec![],
            current_slide: 0,
        };

        assert_eq!(deck.total_slides(), 2);
        assert_eq!(deck.slide_url(1), Some("/uploads/b.png"));
        assert_eq!(deck.slide_url(2), None);
    }

    #[test]
    fn test_ice_candidate_optional_fields_omitted() {
        let candidate = IceCandidate {
            candidate: "candidate:1 1 udp 2122260223 192.0.2.1 54400 typ host".into(),
            sdp_mid: None,
            sdp_mline_index: None,
        };

        let json = serde_json::to_string(&candidate).unwrap();
        assert!(!json.contains("sdp_mid"));
        assert!(!json.contains("sdp_mline_index"));
    }
}
