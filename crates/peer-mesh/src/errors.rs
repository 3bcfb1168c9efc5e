//! Peer-mesh error types.

use thiserror::Error;

use crate::negotiation::PeerState;

/// Errors raised while forming or maintaining peer connections.
///
/// A negotiation failure is always isolated to its peer pair; nothing here
/// touches room state or other pairs.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Local capture failed (no device, permission denied). Surfaced to
    /// the user; never sent to the room.
    #[error("Media acquisition failed: {0}")]
    MediaAcquisition(String),

    /// SDP or ICE processing failed for this pair.
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// An operation arrived in a state that cannot accept it.
    #[error("Invalid transition from {from:?} on {event}")]
    InvalidTransition {
        from: PeerState,
        event: &'static str,
    },

    /// The peer task is gone (already torn down).
    #[error("Peer task channel closed")]
    ChannelClosed,
}
