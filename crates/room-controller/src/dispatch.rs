//! Static command dispatcher.
//!
//! One function maps every decoded [`ClientCommand`] to the corresponding
//! room-handle call, with the client's context passed in explicitly. The
//! transport layer calls this for each inbound frame after a successful
//! join; there are no per-connection handler registrations anywhere.
//!
//! Owner-gated denials and stale references come back from the room as
//! errors but are protocol-level no-ops: the dispatcher logs them and
//! reports success to the transport. Only transport-worthy failures
//! (capacity, timeout, internal) propagate.

use common::{ClientId, UserId};
use signal_protocol::ClientCommand;
use tracing::{debug, warn};

use crate::actors::{JoinProfile, PeerSignal, RoomActorHandle};
use crate::errors::RoomError;

/// Context for one joined client, built by the transport from the accepted
/// join.
#[derive(Clone)]
pub struct ClientContext {
    /// Transport-session identity.
    pub client_id: ClientId,
    /// Stable user identity.
    pub user_id: UserId,
    /// Display name presented at join.
    pub display_name: String,
    /// Handle to the joined room.
    pub room: RoomActorHandle,
}

impl ClientContext {
    /// Build a context from the profile a join was accepted with.
    #[must_use]
    pub fn new(profile: &JoinProfile, room: RoomActorHandle) -> Self {
        Self {
            client_id: profile.client_id,
            user_id: profile.user_id.clone(),
            display_name: profile.display_name.clone(),
            room,
        }
    }
}

/// Dispatch one inbound command against the client's room.
pub async fn dispatch(ctx: &ClientContext, command: ClientCommand) -> Result<(), RoomError> {
    let command_name = command.name();

    let result = match command {
        // Joins are handled by the registry before a context exists; a
        // repeat join on a live context is a protocol violation we drop.
        ClientCommand::JoinRoom { room_id, .. } => {
            warn!(
                target: "hud.dispatch",
                client_id = %ctx.client_id,
                room_id = %room_id,
                "Join from already-joined client ignored"
            );
            Ok(())
        }

        ClientCommand::LeaveRoom => ctx.room.leave(ctx.client_id).await,

        ClientCommand::Offer {
            target,
            description,
        } => {
            ctx.room
                .signal(ctx.client_id, PeerSignal::Offer {
                    target,
                    description,
                })
                .await
        }

        ClientCommand::Answer {
            target,
            description,
        } => {
            ctx.room
                .signal(ctx.client_id, PeerSignal::Answer {
                    target,
                    description,
                })
                .await
        }

        ClientCommand::IceCandidate { target, candidate } => {
            ctx.room
                .signal(ctx.client_id, PeerSignal::Candidate { target, candidate })
                .await
        }

        ClientCommand::ChatMessage { message } => ctx.room.chat(ctx.client_id, message).await,

        ClientCommand::LockMeeting => ctx.room.set_lock(ctx.client_id, true).await,

        ClientCommand::UnlockMeeting => ctx.room.set_lock(ctx.client_id, false).await,

        ClientCommand::EndMeeting => ctx.room.end_meeting(ctx.client_id).await,

        ClientCommand::StartPresentation { presentation } => {
            ctx.room
                .start_presentation(ctx.client_id, presentation)
                .await
        }

        ClientCommand::ChangeSlide { index } => ctx.room.change_slide(ctx.client_id, index).await,

        ClientCommand::EndPresentation => ctx.room.end_presentation(ctx.client_id).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_silent() => {
            debug!(
                target: "hud.dispatch",
                client_id = %ctx.client_id,
                command = command_name,
                error = %e,
                "Command dropped as no-op"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::{ActorMetrics, RoomActor};
    use common::RoomId;
    use signal_protocol::ServerEvent;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    async fn joined_context(
        handle: &RoomActorHandle,
        name: &str,
    ) -> (ClientContext, mpsc::Receiver<ServerEvent>) {
        let profile = JoinProfile {
            client_id: ClientId::new(),
            user_id: UserId::from(name),
            display_name: name.to_string(),
        };
        let (tx, rx) = mpsc::channel(64);
        let accepted = handle.join(profile.clone(), tx).await.unwrap();
        (ClientContext::new(&profile, accepted.room), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_dispatch_swallows_owner_gated_denial() {
        let (handle, _task) = RoomActor::spawn(
            RoomId::from("DSP001"),
            16,
            CancellationToken::new(),
            ActorMetrics::new(),
        );

        let (_owner_ctx, mut owner_rx) = joined_context(&handle, "alice").await;
        let (guest_ctx, mut guest_rx) = joined_context(&handle, "bob").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        drain(&mut owner_rx);
        drain(&mut guest_rx);

        // Non-owner lock: silent no-op, no broadcast, no state change.
        let result = dispatch(&guest_ctx, ClientCommand::LockMeeting).await;
        assert!(result.is_ok());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.state().await.unwrap().locked);
        assert!(drain(&mut owner_rx).is_empty());
        assert!(drain(&mut guest_rx).is_empty());

        handle.cancel();
    }

    #[tokio::test]
    async fn test_dispatch_routes_targeted_signal() {
        let (handle, _task) = RoomActor::spawn(
            RoomId::from("DSP002"),
            16,
            CancellationToken::new(),
            ActorMetrics::new(),
        );

        let (owner_ctx, mut owner_rx) = joined_context(&handle, "alice").await;
        let (guest_ctx, mut guest_rx) = joined_context(&handle, "bob").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        drain(&mut owner_rx);
        drain(&mut guest_rx);

        dispatch(
            &guest_ctx,
            ClientCommand::Answer {
                target: owner_ctx.client_id,
                description: signal_protocol::SessionDescription::new("v=0"),
            },
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let owner_events = drain(&mut owner_rx);
        assert!(matches!(
            owner_events.as_slice(),
            [ServerEvent::AnswerReceived { from, .. }] if *from == guest_ctx.client_id
        ));
        assert!(drain(&mut guest_rx).is_empty());

        handle.cancel();
    }

    #[tokio::test]
    async fn test_dispatch_repeat_join_is_ignored() {
        let (handle, _task) = RoomActor::spawn(
            RoomId::from("DSP003"),
            16,
            CancellationToken::new(),
            ActorMetrics::new(),
        );

        let (ctx, _rx) = joined_context(&handle, "alice").await;

        let result = dispatch(
            &ctx,
            ClientCommand::JoinRoom {
                room_id: RoomId::from("DSP003"),
                user_id: UserId::from("alice"),
                display_name: "alice".into(),
            },
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(handle.state().await.unwrap().participants.len(), 1);

        handle.cancel();
    }
}
