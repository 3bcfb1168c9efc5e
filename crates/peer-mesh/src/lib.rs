//! Peer-mesh formation for Huddle clients.
//!
//! A client in a room holds one direct media connection to every other
//! participant (full mesh, O(N²) connections across the room). This crate
//! owns the signaling-driven half of that: the per-peer negotiation state
//! machine, the task running each peer pair, and the session controller
//! that reacts to server events and emits signaling commands.
//!
//! The media engine itself (capture, encode, the actual RTC transport) is
//! an external collaborator reached through the traits in [`engine`]; this
//! crate never touches a socket or a camera.
//!
//! # Initiator rule
//!
//! The newly joining client initiates toward every participant in its join
//! snapshot; existing participants only ever answer. Exactly one side of
//! each pair offers, so there are no glare cases to resolve.
//!
//! # Structure
//!
//! - [`negotiation`] - the `New → OfferSent|OfferReceived → AnswerPending →
//!   Connected → terminal` state machine, with premature-candidate
//!   buffering
//! - [`peer`] - one task per remote peer, owning its media connection
//! - [`controller`] - the session controller owning the peer map

pub mod controller;
pub mod engine;
pub mod errors;
pub mod negotiation;
pub mod peer;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::SessionController;
pub use engine::{
    ConnectionFactory, ConnectionSignal, LocalMedia, MediaConnection, TrackHandle, TrackKind,
    TransportState,
};
pub use errors::NegotiationError;
pub use negotiation::{PeerNegotiation, PeerState};
pub use peer::{PeerClosed, PeerHandle, PeerRole};
