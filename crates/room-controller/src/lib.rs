//! Room Controller Service Library
//!
//! This library provides the core functionality for the Huddle Room
//! Controller - the stateful signaling server responsible for:
//!
//! - Room membership and lifecycle (created on first join, destroyed on
//!   last leave or owner end-meeting)
//! - Owner election and owner-gated shared state (meeting lock,
//!   presentation slide)
//! - Relay of peer-connection handshakes (offer/answer/trickled ICE) as
//!   addressed unicasts
//! - Chat fan-out and membership broadcasts
//!
//! The signaling transport itself is an external collaborator: it hands the
//! controller one opaque outbound channel per client at join time and calls
//! [`dispatch::dispatch`] for every decoded inbound command. Anything that
//! can carry ordered text frames per client can sit in front of this crate.
//!
//! # Architecture
//!
//! The controller uses an actor model hierarchy:
//!
//! ```text
//! RegistryActor (singleton per instance)
//! ├── supervises N RoomActors
//! │   └── RoomActor (one per live room)
//! │       ├── owns all room state (single writer)
//! │       └── supervises N ConnectionActors
//! │           └── ConnectionActor (one per joined client)
//! └── reaps rooms whose actors finished (emptied or ended)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Serialized mutation**: every room mutation flows through that room's
//!   mailbox, so concurrent joins, leaves, and owner operations can never
//!   interleave mid-update.
//! - **Implicit room creation**: the first join to an unseen id creates the
//!   room and grants ownership; the registry mailbox makes the
//!   create-or-join decision atomic under racing first-joins.
//! - **Ephemeral state**: nothing survives the process. Persistence is an
//!   explicit non-goal.
//! - **Two identities**: the transport session id ([`common::ClientId`])
//!   addresses delivery; the stable [`common::UserId`] names the person.
//!   Ownership is held by whoever joined, not by a connection instance.
//!
//! # Modules
//!
//! - [`actors`] - Actor model implementation
//! - [`dispatch`] - Static command dispatcher for the transport layer
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-safe messages

pub mod actors;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod observability;
