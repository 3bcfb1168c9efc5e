//! Room Controller error types.
//!
//! Error values map to signaling error codes for client responses. Internal
//! detail stays in server-side logs and never reaches a client.

use thiserror::Error;

/// Room Controller error type.
///
/// Maps to signaling error code values:
/// - `AuthorizationDenied`: `FORBIDDEN` (3)
/// - `RoomNotFound`, `ParticipantNotFound`: `NOT_FOUND` (4)
/// - `AlreadyJoined`: `CONFLICT` (5)
/// - `Internal`, `RoomClosed`: `INTERNAL_ERROR` (6)
/// - `RoomFull`, `Draining`: `CAPACITY_EXCEEDED` (7)
/// - `ChannelTimeout`: `TIMEOUT` (8)
#[derive(Debug, Error)]
pub enum RoomError {
    /// A non-owner invoked an owner-gated operation. Never mutates state.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The referenced room does not exist.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// The referenced participant is not in the room.
    #[error("Participant not found")]
    ParticipantNotFound,

    /// The client id is already a member of the room.
    #[error("Participant already in room")]
    AlreadyJoined,

    /// The room is at its mesh capacity bound.
    #[error("Room is full")]
    RoomFull,

    /// The registry is shutting down and refuses new joins.
    #[error("Controller is draining")]
    Draining,

    /// The room actor has already terminated.
    #[error("Room closed")]
    RoomClosed,

    /// Channel setup exceeded its bound; the join was rolled back.
    #[error("Channel setup timed out")]
    ChannelTimeout,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// Returns the signaling error code value for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            RoomError::AuthorizationDenied(_) => 3,
            RoomError::RoomNotFound(_) | RoomError::ParticipantNotFound => 4,
            RoomError::AlreadyJoined => 5,
            RoomError::Internal(_) | RoomError::RoomClosed => 6,
            RoomError::RoomFull | RoomError::Draining => 7,
            RoomError::ChannelTimeout => 8,
        }
    }

    /// Returns a client-safe message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RoomError::AuthorizationDenied(_) => "Operation requires the owner role".to_string(),
            RoomError::RoomNotFound(_) => "Room not found".to_string(),
            RoomError::ParticipantNotFound => "Participant not found".to_string(),
            RoomError::AlreadyJoined => "Already in this room".to_string(),
            RoomError::RoomFull => "Room is full".to_string(),
            RoomError::Draining => "Server is shutting down, please retry".to_string(),
            RoomError::ChannelTimeout => "Connection setup timed out".to_string(),
            RoomError::Internal(_) | RoomError::RoomClosed => {
                "An internal error occurred".to_string()
            }
        }
    }

    /// Whether the dispatcher should swallow this error as a silent no-op.
    ///
    /// Owner-gated denials and stale references are protocol no-ops by
    /// design; everything else is worth surfacing to the transport.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            RoomError::AuthorizationDenied(_)
                | RoomError::RoomNotFound(_)
                | RoomError::ParticipantNotFound
                | RoomError::RoomClosed
        )
    }
}
