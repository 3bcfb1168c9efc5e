//! `RegistryActor` - singleton supervisor owning the room map.
//!
//! The `RegistryActor` is the top-level actor of the controller:
//!
//! - Owns the only map from room id to `RoomActor`
//! - Serializes room creation, so two concurrent first-joins to the same
//!   unseen id resolve to one room and exactly one owner
//! - Reaps rooms whose actors finished (emptied or ended) and detects
//!   panicked room tasks
//! - Owns the root `CancellationToken` for graceful shutdown
//!
//! The raw map is never exposed; callers only get the atomic operations on
//! the handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::RoomId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::messages::{
    EventSink, JoinAccepted, JoinProfile, RegistryMessage, RegistryStatus, RoomSnapshot,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomActorHandle};
use crate::config::Config;
use crate::errors::RoomError;

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `RegistryActor`.
///
/// This is the public interface of the coordinator: the transport layer
/// calls [`RegistryActorHandle::join`] when a client asks for a room and
/// uses the returned [`RoomActorHandle`] for everything after.
#[derive(Clone)]
pub struct RegistryActorHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RegistryActorHandle {
    /// Create a new `RegistryActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    #[must_use]
    pub fn new(config: &Config, metrics: Arc<ActorMetrics>) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RegistryActor::new(config, receiver, cancel_token.clone(), metrics);
        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Join a room, creating it if this is the first join to the id.
    ///
    /// Applies the channel-setup bound: if the join does not complete
    /// within the configured timeout it fails with
    /// [`RoomError::ChannelTimeout`] and leaves no partial membership
    /// behind.
    pub async fn join(
        &self,
        room_id: RoomId,
        profile: JoinProfile,
        events: EventSink,
    ) -> Result<JoinAccepted, RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Join {
                room_id,
                profile,
                events,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Snapshot an existing room.
    pub async fn room(&self, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current registry status.
    pub async fn status(&self) -> Result<RegistryStatus, RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Initiate graceful shutdown.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for auxiliary tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    /// Handle to the room actor.
    handle: RoomActorHandle,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
}

/// The `RegistryActor` implementation.
pub struct RegistryActor {
    /// Instance ID (for logs).
    instance_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    /// Managed rooms by ID.
    rooms: HashMap<RoomId, ManagedRoom>,
    /// Whether the registry is accepting new joins.
    accepting_new: bool,
    /// Bound on channel setup during join.
    join_timeout: Duration,
    /// Per-room participant bound, passed down to room actors.
    max_room_size: usize,
    /// Shared metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RegistryActor {
    /// Create a new registry actor (not started).
    fn new(
        config: &Config,
        receiver: mpsc::Receiver<RegistryMessage>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Registry, &config.instance_id);

        Self {
            instance_id: config.instance_id.clone(),
            receiver,
            cancel_token,
            rooms: HashMap::new(),
            accepting_new: true,
            join_timeout: config.join_timeout,
            max_room_size: config.max_room_size,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "hud.actor.registry", fields(instance_id = %self.instance_id))]
    async fn run(mut self) {
        info!(
            target: "hud.actor.registry",
            instance_id = %self.instance_id,
            "RegistryActor started"
        );

        loop {
            // Reap rooms whose actors finished (emptied or ended).
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "hud.actor.registry",
                        instance_id = %self.instance_id,
                        "RegistryActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "hud.actor.registry",
                                instance_id = %self.instance_id,
                                "RegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "hud.actor.registry",
            instance_id = %self.instance_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RegistryActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::Join {
                room_id,
                profile,
                events,
                respond_to,
            } => {
                let result = self.handle_join(room_id, profile, events).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let result = self.get_room(&room_id).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::Shutdown { respond_to } => {
                self.initiate_shutdown();
                let _ = respond_to.send(());
            }
        }
    }

    /// Handle a join, creating the room if absent.
    ///
    /// Room creation and the membership change both run under mailbox
    /// serialization (registry here, room inside the room actor), which is
    /// what makes racing first-joins atomic: whichever join message lands
    /// first creates the room and becomes owner, the second lands in the
    /// existing room.
    #[instrument(skip_all, fields(instance_id = %self.instance_id, room_id = %room_id))]
    async fn handle_join(
        &mut self,
        room_id: RoomId,
        profile: JoinProfile,
        events: EventSink,
    ) -> Result<JoinAccepted, RoomError> {
        if !self.accepting_new {
            return Err(RoomError::Draining);
        }

        let mut respawned = false;
        loop {
            let handle = match self.rooms.get(&room_id) {
                Some(managed) => managed.handle.clone(),
                None => self.spawn_room(&room_id),
            };

            match tokio::time::timeout(
                self.join_timeout,
                handle.join(profile.clone(), events.clone()),
            )
            .await
            {
                Ok(Ok(accepted)) => return Ok(accepted),

                // The room emptied between lookup and join; replace it
                // once. Observably this is just "first join to an unseen
                // id".
                Ok(Err(RoomError::RoomClosed)) if !respawned => {
                    debug!(
                        target: "hud.actor.registry",
                        room_id = %room_id,
                        "Room closed during join, respawning"
                    );
                    self.remove_room(&room_id);
                    respawned = true;
                }

                Ok(Err(e)) => return Err(e),

                // Channel-setup bound exceeded. The room may have admitted
                // the participant before we gave up, so compensate with a
                // leave to guarantee no partial membership survives.
                Err(_) => {
                    warn!(
                        target: "hud.actor.registry",
                        room_id = %room_id,
                        client_id = %profile.client_id,
                        timeout_ms = self.join_timeout.as_millis() as u64,
                        "Join timed out, rolling back"
                    );
                    let _ = handle.leave(profile.client_id).await;
                    return Err(RoomError::ChannelTimeout);
                }
            }
        }
    }

    /// Spawn a room actor and register it.
    fn spawn_room(&mut self, room_id: &RoomId) -> RoomActorHandle {
        debug!(
            target: "hud.actor.registry",
            instance_id = %self.instance_id,
            room_id = %room_id,
            "Creating new room actor"
        );

        let room_token = self.cancel_token.child_token();
        let (handle, task_handle) = RoomActor::spawn(
            room_id.clone(),
            self.max_room_size,
            room_token,
            Arc::clone(&self.metrics),
        );

        self.rooms.insert(
            room_id.clone(),
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );

        self.metrics.room_created();

        info!(
            target: "hud.actor.registry",
            instance_id = %self.instance_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room created"
        );

        handle
    }

    /// Drop a room from the map.
    fn remove_room(&mut self, room_id: &RoomId) {
        if let Some(managed) = self.rooms.remove(room_id) {
            managed.handle.cancel();
            self.metrics.room_removed();

            info!(
                target: "hud.actor.registry",
                instance_id = %self.instance_id,
                room_id = %room_id,
                total_rooms = self.rooms.len(),
                "Room removed"
            );
        }
    }

    /// Snapshot a room.
    async fn get_room(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        match self.rooms.get(room_id) {
            Some(managed) => match managed.handle.state().await {
                Ok(snapshot) => Ok(snapshot),
                // The room just finished; the next health check reaps it.
                Err(_) => Err(RoomError::RoomNotFound(room_id.to_string())),
            },
            None => Err(RoomError::RoomNotFound(room_id.to_string())),
        }
    }

    /// Get current registry status.
    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            room_count: self.rooms.len(),
            connection_count: self.metrics.connection_count(),
            is_draining: !self.accepting_new,
        }
    }

    /// Initiate graceful shutdown.
    fn initiate_shutdown(&mut self) {
        info!(
            target: "hud.actor.registry",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            "Initiating graceful shutdown"
        );

        self.accepting_new = false;
        self.cancel_token.cancel();
    }

    /// Perform graceful shutdown.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "hud.actor.registry",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        for managed in self.rooms.values() {
            managed.handle.cancel();
        }

        for (room_id, managed) in self.rooms.drain() {
            match tokio::time::timeout(Duration::from_secs(30), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "hud.actor.registry",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "hud.actor.registry",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "hud.actor.registry",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
        }

        info!(
            target: "hud.actor.registry",
            instance_id = %self.instance_id,
            "Graceful shutdown complete"
        );
    }

    /// Reap rooms whose actor tasks finished.
    async fn check_room_health(&mut self) {
        let finished: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for room_id in finished {
            if let Some(managed) = self.rooms.remove(&room_id) {
                match managed.task_handle.await {
                    Ok(()) => {
                        info!(
                            target: "hud.actor.registry",
                            instance_id = %self.instance_id,
                            room_id = %room_id,
                            "Room actor exited, room deleted"
                        );
                    }
                    Err(join_error) => {
                        if join_error.is_panic() {
                            error!(
                                target: "hud.actor.registry",
                                instance_id = %self.instance_id,
                                room_id = %room_id,
                                error = ?join_error,
                                "Room actor panicked"
                            );
                            self.metrics.record_panic(ActorType::Room);
                        }
                    }
                }

                self.metrics.room_removed();
            }
        }
    }
}
