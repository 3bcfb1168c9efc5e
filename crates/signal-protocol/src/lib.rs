//! Signaling protocol for Huddle.
//!
//! This crate defines the transport-agnostic messages exchanged between a
//! client and the room controller: commands flowing client→server, events
//! flowing server→client, and the handshake payloads (session descriptions,
//! trickled ICE candidates) relayed between peers. The transport itself is
//! out of scope; anything that can carry ordered text frames per client
//! can carry this protocol.

#![warn(clippy::pedantic)]

pub mod codec;
pub mod command;
pub mod event;
pub mod types;

pub use codec::{decode_command, decode_event, encode_command, encode_event, CodecError};
pub use command::ClientCommand;
pub use event::ServerEvent;
pub use types::{ChatMessage, IceCandidate, PeerInfo, Presentation, SessionDescription, Slide};
