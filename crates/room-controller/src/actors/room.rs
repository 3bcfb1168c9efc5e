//! `RoomActor` - per-room actor that owns all room state.
//!
//! Each `RoomActor`:
//! - Is the single writer for one room (membership, owner, lock,
//!   presentation)
//! - Supervises one `ConnectionActor` per joined client
//! - Relays targeted peer-negotiation payloads as addressed unicasts
//! - Terminates itself when the last participant leaves or the owner ends
//!   the meeting; the registry reaps the finished task
//!
//! # Ordering guarantees
//!
//! All mutations flow through this actor's mailbox, so a join's roster
//! snapshot is taken strictly before the join is announced to anyone else,
//! and no two membership changes ever interleave. Per-client delivery order
//! is preserved by each client's `ConnectionActor` mailbox.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{ClientId, RoomId};
use signal_protocol::{ChatMessage, PeerInfo, Presentation, ServerEvent};
use signal_protocol::types::DepartedParticipant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ConnectionActor, ConnectionActorHandle};
use super::messages::{
    EventSink, JoinAccepted, JoinProfile, PeerSignal, PresentationSnapshot, RoomMessage,
    RoomSnapshot,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::errors::RoomError;

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// How often the room sweeps for dead connection actors.
const CONNECTION_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: RoomId,
}

impl RoomActorHandle {
    /// Get the room ID.
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Request to join this room.
    pub async fn join(
        &self,
        profile: JoinProfile,
        events: EventSink,
    ) -> Result<JoinAccepted, RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Join {
                profile,
                events,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    /// Remove a participant (voluntary leave or transport disconnect).
    pub async fn leave(&self, client_id: ClientId) -> Result<(), RoomError> {
        self.sender
            .send(RoomMessage::Leave { client_id })
            .await
            .map_err(|_| RoomError::RoomClosed)
    }

    /// Relay a targeted negotiation payload.
    pub async fn signal(&self, from: ClientId, signal: PeerSignal) -> Result<(), RoomError> {
        self.sender
            .send(RoomMessage::Signal { from, signal })
            .await
            .map_err(|_| RoomError::RoomClosed)
    }

    /// Relay a chat message to the rest of the room.
    pub async fn chat(&self, from: ClientId, message: ChatMessage) -> Result<(), RoomError> {
        self.sender
            .send(RoomMessage::Chat { from, message })
            .await
            .map_err(|_| RoomError::RoomClosed)
    }

    /// Owner-gated lock state change.
    pub async fn set_lock(&self, requester: ClientId, locked: bool) -> Result<(), RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::SetLock {
                requester,
                locked,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    /// Owner-gated meeting termination.
    pub async fn end_meeting(&self, requester: ClientId) -> Result<(), RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::EndMeeting {
                requester,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    /// Owner-gated presentation start.
    pub async fn start_presentation(
        &self,
        requester: ClientId,
        presentation: Presentation,
    ) -> Result<(), RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::StartPresentation {
                requester,
                presentation,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    /// Owner-gated slide change.
    pub async fn change_slide(&self, requester: ClientId, index: usize) -> Result<(), RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::ChangeSlide {
                requester,
                index,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    /// Owner-gated presentation end.
    pub async fn end_presentation(&self, requester: ClientId) -> Result<(), RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::EndPresentation {
                requester,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    /// Get a point-in-time snapshot of the room.
    pub async fn state(&self) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::GetState { respond_to: tx })
            .await
            .map_err(|_| RoomError::RoomClosed)?;

        rx.await.map_err(|_| RoomError::RoomClosed)
    }

    /// Cancel the room actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// One joined participant and its supervised connection.
struct Member {
    /// Identity the client presented at join.
    profile: JoinProfile,
    /// Handle to the connection actor serving this client.
    connection: ConnectionActorHandle,
    /// Join handle for liveness monitoring.
    task_handle: JoinHandle<()>,
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    /// Room ID.
    room_id: RoomId,
    /// Message receiver.
    receiver: mpsc::Receiver<RoomMessage>,
    /// Cancellation token (child of the registry's token).
    cancel_token: CancellationToken,
    /// Handle to self, returned to accepted joiners.
    self_handle: RoomActorHandle,
    /// Members by client id.
    members: HashMap<ClientId, Member>,
    /// Client ids in join order; drives owner re-election.
    join_order: Vec<ClientId>,
    /// Current owner. `None` only while the room is empty.
    owner: Option<ClientId>,
    /// Whether the meeting is locked.
    locked: bool,
    /// Live presentation, if any. Survives ownership transfer until a
    /// current owner explicitly ends it.
    presentation: Option<Presentation>,
    /// Room creation timestamp.
    created_at: DateTime<Utc>,
    /// Mesh capacity bound.
    max_room_size: usize,
    /// Set once the owner ends the meeting; makes repeat ends no-ops.
    is_ending: bool,
    /// Shared actor metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        room_id: RoomId,
        max_room_size: usize,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let handle = RoomActorHandle {
            sender,
            cancel_token: cancel_token.clone(),
            room_id: room_id.clone(),
        };

        let actor = Self {
            room_id: room_id.clone(),
            receiver,
            cancel_token,
            self_handle: handle.clone(),
            members: HashMap::new(),
            join_order: Vec::new(),
            owner: None,
            locked: false,
            presentation: None,
            created_at: Utc::now(),
            max_room_size,
            is_ending: false,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, room_id.to_string()),
        };

        let task_handle = tokio::spawn(actor.run());

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "hud.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "hud.actor.room",
            room_id = %self.room_id,
            "RoomActor started"
        );

        let mut sweep = tokio::time::interval(CONNECTION_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            // Reap connection actors whose tasks finished (transport died
            // without an explicit leave).
            if self.sweep_dead_connections().await {
                break;
            }

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "hud.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                _ = sweep.tick() => {}

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
                            info!(
                                target: "hud.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "hud.actor.room",
            room_id = %self.room_id,
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    /// Handle a single message. Returns true if the actor should exit
    /// (room emptied or meeting ended).
    async fn handle_message(&mut self, message: RoomMessage) -> bool {
        match message {
            RoomMessage::Join {
                profile,
                events,
                respond_to,
            } => {
                let result = self.handle_join(profile, events).await;
                let _ = respond_to.send(result);
                false
            }

            RoomMessage::Leave { client_id } => self.handle_leave(client_id).await,

            RoomMessage::Signal { from, signal } => {
                self.handle_signal(from, signal).await;
                false
            }

            RoomMessage::Chat { from, message } => {
                self.handle_chat(from, message).await;
                false
            }

            RoomMessage::SetLock {
                requester,
                locked,
                respond_to,
            } => {
                let result = self.handle_set_lock(requester, locked).await;
                let _ = respond_to.send(result);
                false
            }

            RoomMessage::EndMeeting {
                requester,
                respond_to,
            } => {
                let result = self.handle_end_meeting(requester).await;
                let ended = result.is_ok();
                let _ = respond_to.send(result);
                ended
            }

            RoomMessage::StartPresentation {
                requester,
                presentation,
                respond_to,
            } => {
                let result = self.handle_start_presentation(requester, presentation).await;
                let _ = respond_to.send(result);
                false
            }

            RoomMessage::ChangeSlide {
                requester,
                index,
                respond_to,
            } => {
                let result = self.handle_change_slide(requester, index).await;
                let _ = respond_to.send(result);
                false
            }

            RoomMessage::EndPresentation {
                requester,
                respond_to,
            } => {
                let result = self.handle_end_presentation(requester).await;
                let _ = respond_to.send(result);
                false
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.snapshot());
                false
            }
        }
    }

    /// Handle a client joining.
    ///
    /// The roster snapshot handed to the joiner is taken before the member
    /// map changes, and the join is announced to others only after the
    /// member is fully registered - every observer sees one consistent
    /// membership transition.
    #[instrument(skip_all, fields(room_id = %self.room_id, client_id = %profile.client_id))]
    async fn handle_join(
        &mut self,
        profile: JoinProfile,
        events: EventSink,
    ) -> Result<JoinAccepted, RoomError> {
        if self.is_ending {
            return Err(RoomError::RoomClosed);
        }

        if self.members.contains_key(&profile.client_id) {
            return Err(RoomError::AlreadyJoined);
        }

        if self.members.len() >= self.max_room_size {
            warn!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                max_room_size = self.max_room_size,
                "Join refused, room at mesh capacity"
            );
            return Err(RoomError::RoomFull);
        }

        // Snapshot before anyone learns of this join.
        let existing: Vec<PeerInfo> = self
            .join_order
            .iter()
            .filter_map(|id| self.members.get(id))
            .map(|m| m.profile.to_peer_info())
            .collect();

        let is_owner = self.owner.is_none();

        let connection_token = self.cancel_token.child_token();
        let (conn_handle, conn_task) = ConnectionActor::spawn(
            profile.client_id,
            self.room_id.to_string(),
            events,
            connection_token,
            Arc::clone(&self.metrics),
        );

        let peer_info = profile.to_peer_info();
        let client_id = profile.client_id;

        self.members.insert(
            client_id,
            Member {
                profile,
                connection: conn_handle.clone(),
                task_handle: conn_task,
            },
        );
        self.join_order.push(client_id);
        if is_owner {
            self.owner = Some(client_id);
        }

        self.metrics.connection_created();

        // The joiner's own channel: owner grant first, then the roster.
        if is_owner {
            let _ = conn_handle.deliver(ServerEvent::YouAreOwner).await;
        }
        let _ = conn_handle
            .deliver(ServerEvent::ExistingParticipants {
                participants: existing.clone(),
            })
            .await;

        // Announce only after the snapshot above is fixed.
        self.broadcast_except(
            client_id,
            ServerEvent::ParticipantJoined {
                participant: peer_info,
            },
        )
        .await;

        info!(
            target: "hud.actor.room",
            total_participants = self.members.len(),
            is_owner,
            "Participant joined"
        );

        Ok(JoinAccepted {
            is_owner,
            existing_participants: existing,
            room: self.self_handle.clone(),
        })
    }

    /// Handle a participant leaving (voluntary or transport-detected).
    ///
    /// Returns true when the room emptied and the actor should exit.
    #[instrument(skip_all, fields(room_id = %self.room_id, client_id = %client_id))]
    async fn handle_leave(&mut self, client_id: ClientId) -> bool {
        let Some(mut member) = self.members.remove(&client_id) else {
            debug!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                "Leave for unknown participant ignored"
            );
            return false;
        };
        self.join_order.retain(|id| *id != client_id);

        // Surface connection-actor panics before dropping the handle.
        if member.task_handle.is_finished() {
            if let Err(join_error) = (&mut member.task_handle).await {
                if join_error.is_panic() {
                    self.metrics.record_panic(ActorType::Connection);
                }
            }
        } else {
            let _ = member.connection.close("left room").await;
        }
        self.metrics.connection_closed();

        // Owner re-election: earliest joined remaining participant wins.
        if self.owner == Some(client_id) {
            self.owner = self.join_order.first().copied();
            if let Some(new_owner) = self.owner {
                if let Some(m) = self.members.get(&new_owner) {
                    let _ = m.connection.deliver(ServerEvent::YouAreOwner).await;
                    info!(
                        target: "hud.actor.room",
                        new_owner = %new_owner,
                        "Ownership reassigned"
                    );
                }
            }
        }

        self.broadcast_except(
            client_id,
            ServerEvent::ParticipantLeft {
                participant: DepartedParticipant {
                    client_id,
                    user_id: member.profile.user_id.clone(),
                    display_name: member.profile.display_name.clone(),
                },
            },
        )
        .await;

        info!(
            target: "hud.actor.room",
            remaining_participants = self.members.len(),
            "Participant left"
        );

        self.members.is_empty()
    }

    /// Relay a targeted negotiation payload to its addressed recipient.
    async fn handle_signal(&mut self, from: ClientId, signal: PeerSignal) {
        let Some(sender) = self.members.get(&from) else {
            warn!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                from = %from,
                "Signal from unknown participant dropped"
            );
            return;
        };
        let from_display_name = sender.profile.display_name.clone();

        let target = signal.target();
        let Some(recipient) = self.members.get(&target) else {
            debug!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                target = %target,
                "Signal for unknown target dropped"
            );
            return;
        };

        let event = match signal {
            PeerSignal::Offer { description, .. } => ServerEvent::OfferReceived {
                description,
                from,
                from_display_name,
            },
            PeerSignal::Answer { description, .. } => ServerEvent::AnswerReceived {
                description,
                from,
            },
            PeerSignal::Candidate { candidate, .. } => ServerEvent::IceCandidateReceived {
                candidate,
                from,
            },
        };

        let _ = recipient.connection.deliver(event).await;
    }

    /// Fan a chat message out to everyone except its sender.
    async fn handle_chat(&mut self, from: ClientId, message: ChatMessage) {
        if !self.members.contains_key(&from) {
            warn!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                from = %from,
                "Chat from unknown participant dropped"
            );
            return;
        }

        self.broadcast_except(from, ServerEvent::ChatMessage { message })
            .await;
    }

    /// Owner-gated lock state change, broadcast to every member.
    async fn handle_set_lock(
        &mut self,
        requester: ClientId,
        locked: bool,
    ) -> Result<(), RoomError> {
        self.require_owner(requester, "lock")?;

        self.locked = locked;
        let event = if locked {
            ServerEvent::MeetingLocked
        } else {
            ServerEvent::MeetingUnlocked
        };
        self.broadcast_all(event).await;

        info!(
            target: "hud.actor.room",
            room_id = %self.room_id,
            locked,
            "Meeting lock changed"
        );

        Ok(())
    }

    /// Owner-gated meeting termination.
    ///
    /// Broadcasts `meeting-ended`, closes every participant's channel, and
    /// signals the run loop to exit so the registry deletes the room.
    /// Ending an already-ending meeting is a no-op.
    async fn handle_end_meeting(&mut self, requester: ClientId) -> Result<(), RoomError> {
        self.require_owner(requester, "end-meeting")?;

        if self.is_ending {
            return Ok(());
        }
        self.is_ending = true;

        info!(
            target: "hud.actor.room",
            room_id = %self.room_id,
            participants = self.members.len(),
            "Meeting ended by owner"
        );

        self.broadcast_all(ServerEvent::MeetingEnded).await;

        for (_, member) in self.members.drain() {
            let _ = member.connection.close("meeting ended").await;
            self.metrics.connection_closed();
        }
        self.join_order.clear();
        self.owner = None;

        Ok(())
    }

    /// Owner-gated presentation start; resets to the first slide.
    async fn handle_start_presentation(
        &mut self,
        requester: ClientId,
        mut presentation: Presentation,
    ) -> Result<(), RoomError> {
        self.require_owner(requester, "start-presentation")?;

        if presentation.slides.is_empty() {
            warn!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                "Ignoring presentation with no slides"
            );
            return Ok(());
        }

        presentation.current_slide = 0;
        let event = ServerEvent::PresentationStarted {
            slides: presentation.slides.clone(),
            current_slide: 0,
            total_slides: presentation.total_slides(),
        };
        self.presentation = Some(presentation);

        self.broadcast_except(requester, event).await;

        info!(
            target: "hud.actor.room",
            room_id = %self.room_id,
            "Presentation started"
        );

        Ok(())
    }

    /// Owner-gated slide change; out-of-bounds indexes are ignored so the
    /// current slide always stays within the deck.
    async fn handle_change_slide(
        &mut self,
        requester: ClientId,
        index: usize,
    ) -> Result<(), RoomError> {
        self.require_owner(requester, "change-slide")?;

        let Some(presentation) = self.presentation.as_mut() else {
            debug!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                "Slide change with no live presentation ignored"
            );
            return Ok(());
        };

        let Some(slide_url) = presentation.slide_url(index).map(ToString::to_string) else {
            warn!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                index,
                total_slides = presentation.total_slides(),
                "Slide index out of bounds, ignored"
            );
            return Ok(());
        };

        presentation.current_slide = index;
        self.broadcast_except(requester, ServerEvent::SlideChanged { index, slide_url })
            .await;

        Ok(())
    }

    /// Owner-gated presentation end.
    async fn handle_end_presentation(&mut self, requester: ClientId) -> Result<(), RoomError> {
        self.require_owner(requester, "end-presentation")?;

        if self.presentation.take().is_some() {
            self.broadcast_except(requester, ServerEvent::PresentationEnded)
                .await;
            info!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                "Presentation ended"
            );
        }

        Ok(())
    }

    /// Build a point-in-time snapshot.
    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            owner: self.owner,
            locked: self.locked,
            participants: self
                .join_order
                .iter()
                .filter_map(|id| self.members.get(id))
                .map(|m| m.profile.to_peer_info())
                .collect(),
            presentation: self.presentation.as_ref().map(|p| PresentationSnapshot {
                current_slide: p.current_slide,
                total_slides: p.total_slides(),
            }),
            created_at: self.created_at,
        }
    }

    /// Check the requester holds the owner role.
    fn require_owner(&self, requester: ClientId, operation: &str) -> Result<(), RoomError> {
        if self.owner == Some(requester) {
            Ok(())
        } else {
            debug!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                requester = %requester,
                operation,
                "Owner-gated operation denied"
            );
            Err(RoomError::AuthorizationDenied(operation.to_string()))
        }
    }

    /// Deliver an event to every member.
    async fn broadcast_all(&self, event: ServerEvent) {
        for id in &self.join_order {
            if let Some(member) = self.members.get(id) {
                let _ = member.connection.deliver(event.clone()).await;
            }
        }
    }

    /// Deliver an event to every member except one.
    async fn broadcast_except(&self, except: ClientId, event: ServerEvent) {
        for id in &self.join_order {
            if *id == except {
                continue;
            }
            if let Some(member) = self.members.get(id) {
                let _ = member.connection.deliver(event.clone()).await;
            }
        }
    }

    /// Treat members whose connection actor finished as disconnected.
    ///
    /// Returns true when the room emptied as a result.
    async fn sweep_dead_connections(&mut self) -> bool {
        let finished: Vec<ClientId> = self
            .members
            .iter()
            .filter(|(_, m)| m.task_handle.is_finished())
            .map(|(id, _)| *id)
            .collect();

        let mut emptied = false;
        for client_id in finished {
            info!(
                target: "hud.actor.room",
                room_id = %self.room_id,
                client_id = %client_id,
                "Connection actor finished, treating as disconnect"
            );
            emptied = self.handle_leave(client_id).await;
        }
        emptied
    }

    /// Perform graceful shutdown on cancellation.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "hud.actor.room",
            room_id = %self.room_id,
            participants = self.members.len(),
            "Performing graceful shutdown"
        );

        for member in self.members.values() {
            member.connection.cancel();
        }

        for (client_id, member) in self.members.drain() {
            match tokio::time::timeout(Duration::from_secs(5), member.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "hud.actor.room",
                        room_id = %self.room_id,
                        client_id = %client_id,
                        "Connection completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    if e.is_panic() {
                        self.metrics.record_panic(ActorType::Connection);
                    }
                    warn!(
                        target: "hud.actor.room",
                        room_id = %self.room_id,
                        client_id = %client_id,
                        error = ?e,
                        "Connection task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "hud.actor.room",
                        room_id = %self.room_id,
                        client_id = %client_id,
                        "Connection shutdown timed out"
                    );
                }
            }
            self.metrics.connection_closed();
        }
        self.join_order.clear();

        info!(
            target: "hud.actor.room",
            room_id = %self.room_id,
            "Graceful shutdown complete"
        );
    }
}
