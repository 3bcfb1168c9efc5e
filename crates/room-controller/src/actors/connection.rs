//! `ConnectionActor` - per-client outbound channel actor.
//!
//! Each `ConnectionActor`:
//! - Owns the opaque outbound half of one client's signaling channel
//! - Decouples the room's fan-out from slow clients (the room enqueues
//!   into the mailbox and moves on)
//! - Closes exactly once, whether asked by the room or cancelled by the
//!   supervision tree
//!
//! # Lifecycle
//!
//! 1. Created when a client's join is accepted by the `RoomActor`
//! 2. Runs until the room closes it, the client's transport drops the
//!    receiving half, or cancellation propagates from above
//! 3. Dropping the actor drops the event sink, which is the signal the
//!    external transport uses to tear the socket down

use std::sync::Arc;

use signal_protocol::ServerEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::{ConnectionMessage, EventSink};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::errors::RoomError;
use common::ClientId;

/// Default channel buffer size for the connection mailbox.
const CONNECTION_CHANNEL_BUFFER: usize = 200;

/// Handle to a `ConnectionActor`.
#[derive(Clone, Debug)]
pub struct ConnectionActorHandle {
    sender: mpsc::Sender<ConnectionMessage>,
    cancel_token: CancellationToken,
    client_id: ClientId,
}

impl ConnectionActorHandle {
    /// Get the client ID this connection serves.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Deliver an event to the client.
    pub async fn deliver(&self, event: ServerEvent) -> Result<(), RoomError> {
        self.sender
            .send(ConnectionMessage::Deliver { event })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))
    }

    /// Close the channel once everything already queued has been delivered.
    pub async fn close(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        self.sender
            .send(ConnectionMessage::Close {
                reason: reason.into(),
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))
    }

    /// Cancel the connection actor without draining its mailbox.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor {
    /// Client this connection serves.
    client_id: ClientId,
    /// Room the client joined.
    room_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<ConnectionMessage>,
    /// Outbound half of the client's signaling channel.
    events: EventSink,
    /// Cancellation token (child of the room's token).
    cancel_token: CancellationToken,
    /// Shared metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
    /// Whether the connection is closing.
    is_closing: bool,
}

impl ConnectionActor {
    /// Spawn a new connection actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        client_id: ClientId,
        room_id: String,
        events: EventSink,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (ConnectionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CONNECTION_CHANNEL_BUFFER);

        let actor = Self {
            client_id,
            room_id,
            receiver,
            events,
            cancel_token: cancel_token.clone(),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Connection, client_id.to_string()),
            is_closing: false,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConnectionActorHandle {
            sender,
            cancel_token,
            client_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(
        skip_all,
        name = "hud.actor.connection",
        fields(client_id = %self.client_id, room_id = %self.room_id)
    )]
    async fn run(mut self) {
        debug!(
            target: "hud.actor.connection",
            client_id = %self.client_id,
            room_id = %self.room_id,
            "ConnectionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "hud.actor.connection",
                        client_id = %self.client_id,
                        "ConnectionActor received cancellation signal"
                    );
                    self.mark_closed("cancelled");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            let should_exit = self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();

                            if should_exit {
                                break;
                            }
                        }
                        None => {
                            debug!(
                                target: "hud.actor.connection",
                                client_id = %self.client_id,
                                "ConnectionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "hud.actor.connection",
            client_id = %self.client_id,
            room_id = %self.room_id,
            messages_processed = self.mailbox.messages_processed(),
            "ConnectionActor stopped"
        );
    }

    /// Handle a single message. Returns true if the actor should exit.
    async fn handle_message(&mut self, message: ConnectionMessage) -> bool {
        match message {
            ConnectionMessage::Deliver { event } => self.handle_deliver(event).await,
            ConnectionMessage::Close { reason } => {
                self.mark_closed(&reason);
                true
            }
        }
    }

    /// Forward an event onto the client's channel.
    ///
    /// Returns true (exit) when the transport has dropped its receiving
    /// half - the room reaps the finished task and treats it as a
    /// disconnect.
    async fn handle_deliver(&mut self, event: ServerEvent) -> bool {
        if self.is_closing {
            warn!(
                target: "hud.actor.connection",
                client_id = %self.client_id,
                event = event.name(),
                "Dropping event queued behind close"
            );
            return false;
        }

        debug!(
            target: "hud.actor.connection",
            client_id = %self.client_id,
            event = event.name(),
            "Delivering event to client"
        );

        if self.events.send(event).await.is_err() {
            info!(
                target: "hud.actor.connection",
                client_id = %self.client_id,
                room_id = %self.room_id,
                "Client channel gone, treating as disconnect"
            );
            self.mark_closed("channel gone");
            return true;
        }

        false
    }

    /// Flip the closing flag exactly once.
    fn mark_closed(&mut self, reason: &str) {
        if self.is_closing {
            return;
        }
        self.is_closing = true;

        debug!(
            target: "hud.actor.connection",
            client_id = %self.client_id,
            reason = %reason,
            "Closing connection"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn_test_actor() -> (
        ConnectionActorHandle,
        JoinHandle<()>,
        mpsc::Receiver<ServerEvent>,
    ) {
        let metrics = ActorMetrics::new();
        let cancel_token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(16);

        let (handle, task) = ConnectionActor::spawn(
            ClientId::new(),
            "room-1".to_string(),
            events_tx,
            cancel_token,
            metrics,
        );

        (handle, task, events_rx)
    }

    #[tokio::test]
    async fn test_connection_actor_delivers_events() {
        let (handle, _task, mut events_rx) = spawn_test_actor();

        handle.deliver(ServerEvent::MeetingLocked).await.unwrap();
        handle.deliver(ServerEvent::MeetingUnlocked).await.unwrap();

        assert_eq!(events_rx.recv().await.unwrap(), ServerEvent::MeetingLocked);
        assert_eq!(
            events_rx.recv().await.unwrap(),
            ServerEvent::MeetingUnlocked
        );

        handle.cancel();
    }

    #[tokio::test]
    async fn test_connection_actor_close_delivers_queued_first() {
        let (handle, task, mut events_rx) = spawn_test_actor();

        handle.deliver(ServerEvent::MeetingEnded).await.unwrap();
        handle.close("meeting ended").await.unwrap();

        // The queued event lands before the close takes effect.
        assert_eq!(events_rx.recv().await.unwrap(), ServerEvent::MeetingEnded);

        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok());

        // The sink was dropped with the actor.
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_connection_actor_exits_when_client_channel_dropped() {
        let (handle, task, events_rx) = spawn_test_actor();

        drop(events_rx);
        handle.deliver(ServerEvent::MeetingLocked).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connection_actor_cancellation() {
        let (handle, task, _events_rx) = spawn_test_actor();

        handle.cancel();
        assert!(handle.is_cancelled());

        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connection_actor_parent_cancellation() {
        let parent_token = CancellationToken::new();
        let metrics = ActorMetrics::new();
        let (events_tx, _events_rx) = mpsc::channel(16);

        let (handle, task) = ConnectionActor::spawn(
            ClientId::new(),
            "room-1".to_string(),
            events_tx,
            parent_token.child_token(),
            metrics,
        );

        parent_token.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_cancelled());

        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok());
    }
}
