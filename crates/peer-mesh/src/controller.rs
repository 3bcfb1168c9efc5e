//! Session controller: the client-resident owner of the peer map.
//!
//! One `SessionController` exists per joined room. It reacts to server
//! events (spawning initiator pairs from the join snapshot, answering
//! incoming offers, feeding relayed candidates, tearing pairs down when
//! their participant leaves), emits signaling commands, and fans local
//! media changes across the mesh.
//!
//! Events the mesh does not own (chat, lock state, presentation state) are
//! handed back to the caller untouched, so the embedding UI keeps a single
//! event stream.

use std::collections::HashMap;
use std::sync::Arc;

use common::ClientId;
use signal_protocol::{ClientCommand, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{ConnectionFactory, LocalMedia, TrackHandle, TrackKind};
use crate::errors::NegotiationError;
use crate::peer::{PeerClosed, PeerHandle, PeerRole, PeerTask};

/// Buffer for terminal-state reports from peer tasks.
const CLOSED_CHANNEL_BUFFER: usize = 64;

/// One live peer pair.
struct ManagedPeer {
    /// Handle to the peer task.
    handle: PeerHandle,
    /// Join handle, kept so teardown can be observed in tests.
    #[allow(dead_code)]
    task_handle: JoinHandle<()>,
}

/// Client-side controller for one room session.
pub struct SessionController<F: ConnectionFactory, M: LocalMedia> {
    /// Connection factory from the external engine.
    factory: Arc<F>,
    /// Local capture from the external engine.
    media: Arc<M>,
    /// Current outbound tracks; new pairs attach these.
    tracks: Vec<TrackHandle>,
    /// Outbound signaling commands toward the room controller.
    commands: mpsc::Sender<ClientCommand>,
    /// Live pairs by remote peer.
    peers: HashMap<ClientId, ManagedPeer>,
    /// Terminal-state reports from peer tasks.
    closed_tx: mpsc::Sender<PeerClosed>,
    closed_rx: mpsc::Receiver<PeerClosed>,
    /// Root cancellation for all pairs.
    cancel_token: CancellationToken,
    /// Whether this client currently holds the owner role.
    is_owner: bool,
}

impl<F: ConnectionFactory, M: LocalMedia> SessionController<F, M> {
    /// Acquire local media and build a controller.
    ///
    /// Capture failure surfaces as
    /// [`NegotiationError::MediaAcquisition`] before anything touched the
    /// room.
    pub async fn start(
        factory: Arc<F>,
        media: Arc<M>,
        commands: mpsc::Sender<ClientCommand>,
    ) -> Result<Self, NegotiationError> {
        let tracks = media.acquire().await?;
        let (closed_tx, closed_rx) = mpsc::channel(CLOSED_CHANNEL_BUFFER);

        info!(
            target: "hud.mesh.session",
            tracks = tracks.len(),
            "Local media ready"
        );

        Ok(Self {
            factory,
            media,
            tracks,
            commands,
            peers: HashMap::new(),
            closed_tx,
            closed_rx,
            cancel_token: CancellationToken::new(),
            is_owner: false,
        })
    }

    /// Whether this client currently holds the owner role.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Number of live pairs.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// React to one server event.
    ///
    /// Handshake relays (offers, answers, candidates) are consumed and
    /// return `None`; everything with user-facing relevance comes back as
    /// `Some` for the embedding application, after the mesh has reacted to
    /// it.
    pub async fn handle_event(&mut self, event: ServerEvent) -> Option<ServerEvent> {
        match event {
            ServerEvent::YouAreOwner => {
                self.is_owner = true;
                Some(ServerEvent::YouAreOwner)
            }

            // We are the newcomer: initiate toward everyone already there.
            // The event still reaches the UI for the initial roster.
            ServerEvent::ExistingParticipants { participants } => {
                for peer in &participants {
                    if let Err(e) = self.spawn_peer(peer.client_id, PeerRole::Initiator).await {
                        warn!(
                            target: "hud.mesh.session",
                            remote = %peer.client_id,
                            error = %e,
                            "Failed to open pair toward existing participant"
                        );
                    }
                }
                Some(ServerEvent::ExistingParticipants { participants })
            }

            // Newcomers initiate toward us; nothing to do until their offer
            // arrives. Hand the event to the UI for the roster.
            ServerEvent::ParticipantJoined { participant } => {
                Some(ServerEvent::ParticipantJoined { participant })
            }

            ServerEvent::OfferReceived {
                description, from, ..
            } => {
                if self.peers.contains_key(&from) {
                    warn!(
                        target: "hud.mesh.session",
                        remote = %from,
                        "Duplicate offer for live pair dropped"
                    );
                    return None;
                }
                match self.spawn_peer(from, PeerRole::Responder).await {
                    Ok(handle) => {
                        let _ = handle.remote_offer(description).await;
                    }
                    Err(e) => {
                        warn!(
                            target: "hud.mesh.session",
                            remote = %from,
                            error = %e,
                            "Failed to open pair for incoming offer"
                        );
                    }
                }
                None
            }

            ServerEvent::AnswerReceived { description, from } => {
                match self.peers.get(&from) {
                    Some(peer) => {
                        let _ = peer.handle.remote_answer(description).await;
                    }
                    None => {
                        warn!(
                            target: "hud.mesh.session",
                            remote = %from,
                            "Answer for unknown pair dropped"
                        );
                    }
                }
                None
            }

            ServerEvent::IceCandidateReceived { candidate, from } => {
                match self.peers.get(&from) {
                    Some(peer) => {
                        let _ = peer.handle.remote_candidate(candidate).await;
                    }
                    None => {
                        debug!(
                            target: "hud.mesh.session",
                            remote = %from,
                            "Candidate for unknown pair dropped"
                        );
                    }
                }
                None
            }

            // Keep the mesh consistent with membership, then let the UI
            // update the roster.
            ServerEvent::ParticipantLeft { participant } => {
                self.teardown_peer(participant.client_id);
                Some(ServerEvent::ParticipantLeft { participant })
            }

            ServerEvent::MeetingEnded => {
                self.shutdown().await;
                Some(ServerEvent::MeetingEnded)
            }

            // Not the mesh's concern.
            other => Some(other),
        }
    }

    /// Wait for the next pair to reach a terminal state.
    ///
    /// Finishing the teardown here (removing the pair from the map) is what
    /// makes external failure reports and explicit teardowns converge on
    /// exactly-once resource release.
    pub async fn next_closed_peer(&mut self) -> Option<PeerClosed> {
        let closed = self.closed_rx.recv().await?;
        self.peers.remove(&closed.remote);
        Some(closed)
    }

    /// Swap the outbound video track on every live pair, as one unit.
    ///
    /// All pairs are asked to swap and all acknowledgements are awaited
    /// before returning, so no peer keeps sending the old track after this
    /// resolves. The new track also becomes the attach-track for pairs
    /// created later.
    pub async fn replace_outbound_track(
        &mut self,
        track: TrackHandle,
    ) -> Result<(), NegotiationError> {
        let mut failures = 0usize;

        let handles: Vec<PeerHandle> = self.peers.values().map(|p| p.handle.clone()).collect();
        for handle in handles {
            if let Err(e) = handle.replace_track(track.clone()).await {
                warn!(
                    target: "hud.mesh.session",
                    remote = %handle.remote(),
                    error = %e,
                    "Track swap failed on pair"
                );
                failures += 1;
            }
        }

        // Later joiners should get the current track, not the stale one.
        if let Some(slot) = self.tracks.iter_mut().find(|t| t.kind == track.kind) {
            *slot = track;
        } else {
            self.tracks.push(track);
        }

        if failures > 0 {
            return Err(NegotiationError::Negotiation(format!(
                "track swap failed on {failures} pair(s)"
            )));
        }
        Ok(())
    }

    /// Start screen sharing: swap the screen track in across the mesh.
    pub async fn start_screen_share(&mut self) -> Result<(), NegotiationError> {
        let screen = self.media.acquire_screen().await?;
        self.replace_outbound_track(screen).await
    }

    /// Enable or disable local tracks of one kind (mute, camera off).
    pub async fn set_enabled(
        &self,
        kind: TrackKind,
        enabled: bool,
    ) -> Result<(), NegotiationError> {
        self.media.set_enabled(kind, enabled).await
    }

    /// Tear down every pair and stop accepting events.
    pub async fn shutdown(&mut self) {
        info!(
            target: "hud.mesh.session",
            peers = self.peers.len(),
            "Shutting down session"
        );

        for (_, peer) in self.peers.drain() {
            peer.handle.cancel();
        }
        self.cancel_token.cancel();
    }

    /// Open a pair toward `remote` and register it.
    async fn spawn_peer(
        &mut self,
        remote: ClientId,
        role: PeerRole,
    ) -> Result<PeerHandle, NegotiationError> {
        let (connection, signals) = self.factory.connect(remote).await?;

        let (handle, task_handle) = PeerTask::spawn(
            remote,
            connection,
            signals,
            self.tracks.clone(),
            role,
            self.commands.clone(),
            self.closed_tx.clone(),
            self.cancel_token.child_token(),
        );

        debug!(
            target: "hud.mesh.session",
            remote = %remote,
            role = ?role,
            "Pair opened"
        );

        self.peers.insert(
            remote,
            ManagedPeer {
                handle: handle.clone(),
                task_handle,
            },
        );

        Ok(handle)
    }

    /// Tear one pair down. Safe to call repeatedly; only the first call
    /// finds the pair.
    fn teardown_peer(&mut self, remote: ClientId) {
        if let Some(peer) = self.peers.remove(&remote) {
            peer.handle.cancel();
            debug!(
                target: "hud.mesh.session",
                remote = %remote,
                "Pair torn down"
            );
        }
    }
}
