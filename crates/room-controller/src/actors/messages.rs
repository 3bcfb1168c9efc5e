//! Mailbox messages and result types for the actor hierarchy.

use chrono::{DateTime, Utc};
use common::{ClientId, RoomId, UserId};
use signal_protocol::{ChatMessage, IceCandidate, PeerInfo, Presentation, SessionDescription};
use tokio::sync::{mpsc, oneshot};

use super::room::RoomActorHandle;
use crate::errors::RoomError;
use signal_protocol::ServerEvent;

/// Outbound half of one client's signaling channel.
///
/// Handed to the controller by the external transport at join time; the
/// controller never sees the transport itself.
pub type EventSink = mpsc::Sender<ServerEvent>;

/// Identity presented by a joining client.
#[derive(Debug, Clone)]
pub struct JoinProfile {
    /// Transport-session identity (addressed delivery key).
    pub client_id: ClientId,
    /// Stable display-session identity.
    pub user_id: UserId,
    /// Name to show other participants.
    pub display_name: String,
}

impl JoinProfile {
    /// Roster entry for this profile.
    #[must_use]
    pub fn to_peer_info(&self) -> PeerInfo {
        PeerInfo {
            client_id: self.client_id,
            display_name: self.display_name.clone(),
        }
    }
}

/// Result returned to a client whose join was accepted.
#[derive(Debug)]
pub struct JoinAccepted {
    /// Whether the joiner holds the owner role (first joiner only).
    pub is_owner: bool,
    /// Membership snapshot taken before the join was announced; never
    /// contains the joiner itself.
    pub existing_participants: Vec<PeerInfo>,
    /// Handle for the joiner's subsequent room-scoped commands.
    pub room: RoomActorHandle,
}

/// A targeted peer-negotiation payload relayed through the room.
#[derive(Debug, Clone)]
pub enum PeerSignal {
    /// Offer description for the target.
    Offer {
        target: ClientId,
        description: SessionDescription,
    },
    /// Answer description for the target.
    Answer {
        target: ClientId,
        description: SessionDescription,
    },
    /// One trickled candidate for the target.
    Candidate {
        target: ClientId,
        candidate: IceCandidate,
    },
}

impl PeerSignal {
    /// The addressed recipient.
    #[must_use]
    pub fn target(&self) -> ClientId {
        match self {
            PeerSignal::Offer { target, .. }
            | PeerSignal::Answer { target, .. }
            | PeerSignal::Candidate { target, .. } => *target,
        }
    }
}

/// Point-in-time view of one room, for introspection and tests.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Room id.
    pub room_id: RoomId,
    /// Current owner, if the room has members.
    pub owner: Option<ClientId>,
    /// Whether the meeting is locked.
    pub locked: bool,
    /// Members in join order.
    pub participants: Vec<PeerInfo>,
    /// Live presentation state, if any.
    pub presentation: Option<PresentationSnapshot>,
    /// Room creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Presentation slice of a [`RoomSnapshot`].
#[derive(Debug, Clone)]
pub struct PresentationSnapshot {
    /// Currently shown slide.
    pub current_slide: usize,
    /// Deck size.
    pub total_slides: usize,
}

/// Registry status for introspection and readiness.
#[derive(Debug, Clone, Copy)]
pub struct RegistryStatus {
    /// Number of live rooms.
    pub room_count: usize,
    /// Number of live client connections.
    pub connection_count: usize,
    /// Whether the registry refuses new joins.
    pub is_draining: bool,
}

/// Messages handled by the `RegistryActor`.
pub enum RegistryMessage {
    /// Join a room, creating it if absent.
    Join {
        room_id: RoomId,
        profile: JoinProfile,
        events: EventSink,
        respond_to: oneshot::Sender<Result<JoinAccepted, RoomError>>,
    },
    /// Snapshot one room.
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },
    /// Current registry status.
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },
    /// Initiate graceful shutdown.
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Messages handled by a `RoomActor`.
pub enum RoomMessage {
    /// A client joins this room.
    Join {
        profile: JoinProfile,
        events: EventSink,
        respond_to: oneshot::Sender<Result<JoinAccepted, RoomError>>,
    },
    /// A client leaves voluntarily or its transport dropped.
    Leave { client_id: ClientId },
    /// Relay a targeted negotiation payload.
    Signal { from: ClientId, signal: PeerSignal },
    /// Fan a chat message out to everyone but the sender.
    Chat { from: ClientId, message: ChatMessage },
    /// Owner-gated lock state change.
    SetLock {
        requester: ClientId,
        locked: bool,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Owner-gated meeting termination.
    EndMeeting {
        requester: ClientId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Owner-gated presentation start.
    StartPresentation {
        requester: ClientId,
        presentation: Presentation,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Owner-gated slide change.
    ChangeSlide {
        requester: ClientId,
        index: usize,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Owner-gated presentation end.
    EndPresentation {
        requester: ClientId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Snapshot the room.
    GetState {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },
}

/// Messages handled by a `ConnectionActor`.
pub enum ConnectionMessage {
    /// Deliver an event to the client.
    Deliver { event: ServerEvent },
    /// Close the channel after delivering everything already queued.
    Close { reason: String },
}
