//! Shared types for Huddle components.
//!
//! This crate holds the identifier newtypes and the common error type used
//! by both the room controller (server side) and the peer mesh (client
//! side). It deliberately carries no async or transport code.

pub mod error;
pub mod types;

pub use error::{HuddleError, Result};
pub use types::{ClientId, RoomId, UserId};
