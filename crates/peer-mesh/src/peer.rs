//! Per-peer task.
//!
//! Each remote peer gets its own task owning its [`PeerNegotiation`] (and
//! through it the media connection). The task drains two sources: commands
//! from the session controller (relayed descriptions and candidates, track
//! swaps) and signals from the engine (locally discovered candidates,
//! transport state changes). Peer pairs never share state; a pair failing
//! takes down only itself.

use common::ClientId;
use signal_protocol::{ClientCommand, IceCandidate, SessionDescription};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::{ConnectionSignal, MediaConnection, TrackHandle, TransportState};
use crate::errors::NegotiationError;
use crate::negotiation::{PeerNegotiation, PeerState};

/// Channel buffer for the peer mailbox.
const PEER_CHANNEL_BUFFER: usize = 64;

/// Which side of the pair this client is.
///
/// The joining client initiates toward everyone already present; existing
/// participants only respond. Exactly one side offers per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// We joined after the remote: we offer.
    Initiator,
    /// The remote joined after us: we answer its offer.
    Responder,
}

/// Report sent to the session controller when a pair reaches a terminal
/// state, whatever the trigger.
#[derive(Debug, Clone, Copy)]
pub struct PeerClosed {
    /// The remote peer of the finished pair.
    pub remote: ClientId,
    /// Terminal state the pair landed in.
    pub state: PeerState,
}

/// Commands from the session controller to one peer task.
enum PeerCommand {
    /// The remote peer offered to us.
    RemoteOffer { description: SessionDescription },
    /// The remote peer answered our offer.
    RemoteAnswer { description: SessionDescription },
    /// The remote peer trickled a candidate.
    RemoteCandidate { candidate: IceCandidate },
    /// Swap the outbound track without renegotiating.
    ReplaceTrack {
        track: TrackHandle,
        respond_to: oneshot::Sender<Result<(), NegotiationError>>,
    },
}

/// Handle to one peer task.
#[derive(Clone)]
pub struct PeerHandle {
    sender: mpsc::Sender<PeerCommand>,
    cancel_token: CancellationToken,
    remote: ClientId,
}

impl PeerHandle {
    /// The remote peer this handle drives.
    #[must_use]
    pub fn remote(&self) -> ClientId {
        self.remote
    }

    /// Feed a relayed offer to the pair.
    pub async fn remote_offer(&self, description: SessionDescription) -> Result<(), NegotiationError> {
        self.sender
            .send(PeerCommand::RemoteOffer { description })
            .await
            .map_err(|_| NegotiationError::ChannelClosed)
    }

    /// Feed a relayed answer to the pair.
    pub async fn remote_answer(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.sender
            .send(PeerCommand::RemoteAnswer { description })
            .await
            .map_err(|_| NegotiationError::ChannelClosed)
    }

    /// Feed a relayed candidate to the pair.
    pub async fn remote_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.sender
            .send(PeerCommand::RemoteCandidate { candidate })
            .await
            .map_err(|_| NegotiationError::ChannelClosed)
    }

    /// Swap the outbound track and wait for the pair to apply it.
    pub async fn replace_track(&self, track: TrackHandle) -> Result<(), NegotiationError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PeerCommand::ReplaceTrack {
                track,
                respond_to: tx,
            })
            .await
            .map_err(|_| NegotiationError::ChannelClosed)?;

        rx.await.map_err(|_| NegotiationError::ChannelClosed)?
    }

    /// Tear the pair down.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the pair is being torn down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The task driving one peer pair.
pub(crate) struct PeerTask<C: MediaConnection> {
    /// State machine owning the media connection.
    negotiation: PeerNegotiation<C>,
    /// Which side of the pair we are.
    role: PeerRole,
    /// Local tracks to attach before negotiating.
    tracks: Vec<TrackHandle>,
    /// Commands from the session controller.
    receiver: mpsc::Receiver<PeerCommand>,
    /// Signals from the engine.
    signals: mpsc::Receiver<ConnectionSignal>,
    /// Outbound signaling commands (unicasts addressed to the remote).
    commands: mpsc::Sender<ClientCommand>,
    /// Terminal-state reports back to the controller.
    closed_tx: mpsc::Sender<PeerClosed>,
    /// Cancellation (child of the controller's token).
    cancel_token: CancellationToken,
}

impl<C: MediaConnection> PeerTask<C> {
    /// Spawn the task for one remote peer.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        remote: ClientId,
        connection: C,
        signals: mpsc::Receiver<ConnectionSignal>,
        tracks: Vec<TrackHandle>,
        role: PeerRole,
        commands: mpsc::Sender<ClientCommand>,
        closed_tx: mpsc::Sender<PeerClosed>,
        cancel_token: CancellationToken,
    ) -> (PeerHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(PEER_CHANNEL_BUFFER);

        let task = Self {
            negotiation: PeerNegotiation::new(remote, connection),
            role,
            tracks,
            receiver,
            signals,
            commands,
            closed_tx,
            cancel_token: cancel_token.clone(),
        };

        let task_handle = tokio::spawn(task.run());

        let handle = PeerHandle {
            sender,
            cancel_token,
            remote,
        };

        (handle, task_handle)
    }

    /// Run the pair to completion, then report its terminal state.
    async fn run(mut self) {
        let remote = self.negotiation.remote();

        debug!(
            target: "hud.mesh.peer",
            remote = %remote,
            role = ?self.role,
            "Peer task started"
        );

        self.drive(remote).await;

        let state = self.negotiation.state();
        let _ = self.closed_tx.send(PeerClosed { remote, state }).await;

        debug!(
            target: "hud.mesh.peer",
            remote = %remote,
            state = ?state,
            "Peer task stopped"
        );
    }

    /// Drive the pair until it reaches a terminal state.
    async fn drive(&mut self, remote: ClientId) {
        // Local tracks go in before any description is produced, so both
        // descriptions cover them.
        for track in std::mem::take(&mut self.tracks) {
            if let Err(e) = self.negotiation.attach_track(track).await {
                self.fail(e).await;
                return;
            }
        }

        // Initiators open the pair; responders wait for the relayed offer.
        if self.role == PeerRole::Initiator {
            match self.negotiation.start_offer().await {
                Ok(description) => {
                    let _ = self
                        .commands
                        .send(ClientCommand::Offer {
                            target: remote,
                            description,
                        })
                        .await;
                }
                Err(e) => {
                    self.fail(e).await;
                    return;
                }
            }
        }

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    self.negotiation.shut_down(PeerState::Closed).await;
                    break;
                }

                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        }
                        None => {
                            self.negotiation.shut_down(PeerState::Closed).await;
                            break;
                        }
                    }
                }

                signal = self.signals.recv() => {
                    match signal {
                        Some(ConnectionSignal::Candidate(candidate)) => {
                            // Trickle: each local candidate goes out the
                            // moment the engine produces it, addressed to
                            // this peer only.
                            let _ = self
                                .commands
                                .send(ClientCommand::IceCandidate {
                                    target: remote,
                                    candidate,
                                })
                                .await;
                        }
                        Some(ConnectionSignal::StateChanged(transport)) => {
                            if self.handle_transport_state(transport).await {
                                break;
                            }
                        }
                        None => {
                            // Engine dropped the signal stream.
                            self.negotiation.shut_down(PeerState::Closed).await;
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Handle one controller command. Returns true if the task should exit.
    async fn handle_command(&mut self, command: PeerCommand) -> bool {
        let remote = self.negotiation.remote();

        match command {
            PeerCommand::RemoteOffer { description } => {
                match self.negotiation.accept_offer(description).await {
                    Ok(answer) => {
                        // The answer goes back to the offerer only.
                        let _ = self
                            .commands
                            .send(ClientCommand::Answer {
                                target: remote,
                                description: answer,
                            })
                            .await;
                        false
                    }
                    Err(e) => {
                        self.fail(e).await;
                        true
                    }
                }
            }

            PeerCommand::RemoteAnswer { description } => {
                match self.negotiation.accept_answer(description).await {
                    Ok(()) => false,
                    Err(e) => {
                        self.fail(e).await;
                        true
                    }
                }
            }

            PeerCommand::RemoteCandidate { candidate } => {
                match self.negotiation.accept_candidate(candidate).await {
                    Ok(()) => false,
                    Err(e) => {
                        self.fail(e).await;
                        true
                    }
                }
            }

            PeerCommand::ReplaceTrack { track, respond_to } => {
                // A failed swap is reported to the caller but does not end
                // the pair.
                let result = self.negotiation.replace_outbound_track(track).await;
                let _ = respond_to.send(result);
                false
            }
        }
    }

    /// Handle a transport state change. Returns true if the task should
    /// exit.
    async fn handle_transport_state(&mut self, transport: TransportState) -> bool {
        if !transport.is_terminal() {
            return false;
        }

        let terminal = match transport {
            TransportState::Disconnected => PeerState::Disconnected,
            TransportState::Failed => PeerState::Failed,
            TransportState::Connected | TransportState::Closed => PeerState::Closed,
        };

        self.negotiation.shut_down(terminal).await;
        true
    }

    /// Record a negotiation failure and tear the pair down.
    async fn fail(&mut self, error: NegotiationError) {
        warn!(
            target: "hud.mesh.peer",
            remote = %self.negotiation.remote(),
            error = %error,
            "Negotiation failed, tearing down pair"
        );
        self.negotiation.shut_down(PeerState::Failed).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{candidate, MockCall, MockConnection};
    use crate::TrackKind;
    use std::time::Duration;

    struct Harness {
        handle: PeerHandle,
        task: JoinHandle<()>,
        commands_rx: mpsc::Receiver<ClientCommand>,
        closed_rx: mpsc::Receiver<PeerClosed>,
        signals_tx: mpsc::Sender<ConnectionSignal>,
        probe: MockConnection,
        remote: ClientId,
    }

    fn spawn(role: PeerRole) -> Harness {
        let remote = ClientId::new();
        let connection = MockConnection::new();
        let probe = connection.clone();
        let (signals_tx, signals_rx) = mpsc::channel(32);
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (closed_tx, closed_rx) = mpsc::channel(8);

        let (handle, task) = PeerTask::spawn(
            remote,
            connection,
            signals_rx,
            vec![
                TrackHandle::new("mic-0", TrackKind::Audio),
                TrackHandle::new("cam-0", TrackKind::Video),
            ],
            role,
            commands_tx,
            closed_tx,
            CancellationToken::new(),
        );

        Harness {
            handle,
            task,
            commands_rx,
            closed_rx,
            signals_tx,
            probe,
            remote,
        }
    }

    #[tokio::test]
    async fn test_initiator_attaches_tracks_then_offers() {
        let mut h = spawn(PeerRole::Initiator);

        let command = h.commands_rx.recv().await.unwrap();
        assert!(matches!(
            command,
            ClientCommand::Offer { target, .. } if target == h.remote
        ));

        // Tracks were attached before the offer was produced.
        let calls = h.probe.calls();
        let offer_pos = calls
            .iter()
            .position(|c| *c == MockCall::CreateOffer)
            .unwrap();
        assert!(calls
            .iter()
            .take(offer_pos)
            .filter(|c| matches!(c, MockCall::AddTrack(_)))
            .count()
            == 2);

        h.handle.cancel();
    }

    #[tokio::test]
    async fn test_responder_answers_relayed_offer() {
        let mut h = spawn(PeerRole::Responder);

        h.handle
            .remote_offer(SessionDescription::new("offer-from-peer"))
            .await
            .unwrap();

        let command = h.commands_rx.recv().await.unwrap();
        assert!(matches!(
            command,
            ClientCommand::Answer { target, .. } if target == h.remote
        ));

        h.handle.cancel();
    }

    #[tokio::test]
    async fn test_local_candidates_trickle_to_remote() {
        let mut h = spawn(PeerRole::Initiator);

        // Consume the offer.
        let _ = h.commands_rx.recv().await.unwrap();

        h.signals_tx
            .send(ConnectionSignal::Candidate(candidate("host-cand")))
            .await
            .unwrap();

        let command = h.commands_rx.recv().await.unwrap();
        assert!(matches!(
            command,
            ClientCommand::IceCandidate { target, candidate }
                if target == h.remote && candidate.candidate == "host-cand"
        ));

        h.handle.cancel();
    }

    #[tokio::test]
    async fn test_transport_failure_ends_pair_once() {
        let mut h = spawn(PeerRole::Initiator);
        let _ = h.commands_rx.recv().await.unwrap();

        h.signals_tx
            .send(ConnectionSignal::StateChanged(TransportState::Failed))
            .await
            .unwrap();

        let closed = h.closed_rx.recv().await.unwrap();
        assert_eq!(closed.remote, h.remote);
        assert_eq!(closed.state, PeerState::Failed);

        let result = tokio::time::timeout(Duration::from_secs(1), h.task).await;
        assert!(result.is_ok());

        // Exactly one close against the engine.
        let closes = h
            .probe
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Close))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_failed_offer_reports_failed_pair() {
        let remote = ClientId::new();
        let connection = MockConnection::new();
        connection.fail_next_offer("synthetic offer failure");
        let (_signals_tx, signals_rx) = mpsc::channel(8);
        let (commands_tx, _commands_rx) = mpsc::channel(8);
        let (closed_tx, mut closed_rx) = mpsc::channel(8);

        let (_handle, _task) = PeerTask::spawn(
            remote,
            connection,
            signals_rx,
            vec![],
            PeerRole::Initiator,
            commands_tx,
            closed_tx,
            CancellationToken::new(),
        );

        let closed = closed_rx.recv().await.unwrap();
        assert_eq!(closed.state, PeerState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_closes_pair() {
        let mut h = spawn(PeerRole::Responder);

        h.handle.cancel();

        let closed = h.closed_rx.recv().await.unwrap();
        assert_eq!(closed.state, PeerState::Closed);

        let result = tokio::time::timeout(Duration::from_secs(1), h.task).await;
        assert!(result.is_ok());
    }
}
