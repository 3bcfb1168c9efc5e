//! Actor model implementation for the Room Controller.
//!
//! ```text
//! RegistryActor (singleton)
//! └── RoomActor (one per live room)
//!     └── ConnectionActor (one per joined client)
//! ```
//!
//! Every actor follows the same shape: a spawned task draining an `mpsc`
//! mailbox, a cloneable handle exposing typed async methods, oneshot
//! channels for request/response, and a `CancellationToken` child of its
//! supervisor's token.

pub mod connection;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;

pub use connection::{ConnectionActor, ConnectionActorHandle};
pub use messages::{
    EventSink, JoinAccepted, JoinProfile, PeerSignal, PresentationSnapshot, RegistryStatus,
    RoomSnapshot,
};
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxMonitor};
pub use registry::RegistryActorHandle;
pub use room::{RoomActor, RoomActorHandle};
