//! Per-peer negotiation state machine.
//!
//! One `PeerNegotiation` exists per (local, remote) pair and drives its
//! [`MediaConnection`] through:
//!
//! ```text
//! New ─┬─ start_offer ──────→ OfferSent ── accept_answer ─┐
//!      └─ accept_offer ─→ OfferReceived ── (answer sent) ─┼→ AnswerPending → Connected
//!                                                         │
//!                  Connected ──→ Disconnected | Failed | Closed   (terminal)
//! ```
//!
//! Candidates trickled by the remote before its description has been
//! applied are buffered and flushed, in arrival order, immediately after
//! the description lands. Terminal transitions run the connection teardown
//! exactly once; repeated terminal requests are no-ops.

use signal_protocol::{IceCandidate, SessionDescription};
use tracing::{debug, warn};

use common::ClientId;

use crate::engine::{MediaConnection, TrackHandle};
use crate::errors::NegotiationError;

/// Negotiation state of one peer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Connection object exists, nothing exchanged yet.
    New,
    /// Local offer produced and handed to the signaling layer.
    OfferSent,
    /// Remote offer received and applied.
    OfferReceived,
    /// Answer in flight (being produced or being applied).
    AnswerPending,
    /// Descriptions exchanged on both sides; media can flow.
    Connected,
    /// Transport lost connectivity. Terminal.
    Disconnected,
    /// Negotiation or transport failed. Terminal.
    Failed,
    /// Pair shut down deliberately. Terminal.
    Closed,
}

impl PeerState {
    /// Whether the pair is finished for good.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PeerState::Disconnected | PeerState::Failed | PeerState::Closed
        )
    }
}

/// State machine for one peer pair, owning its media connection.
pub struct PeerNegotiation<C: MediaConnection> {
    /// The remote peer.
    remote: ClientId,
    /// Current state.
    state: PeerState,
    /// The underlying connection object.
    connection: C,
    /// Set once the remote description has been applied; gates candidate
    /// application.
    remote_description_set: bool,
    /// Candidates that arrived before the remote description, in arrival
    /// order.
    pending_candidates: Vec<IceCandidate>,
}

impl<C: MediaConnection> PeerNegotiation<C> {
    /// Wrap a fresh connection object.
    pub fn new(remote: ClientId, connection: C) -> Self {
        Self {
            remote,
            state: PeerState::New,
            connection,
            remote_description_set: false,
            pending_candidates: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PeerState {
        self.state
    }

    /// The remote peer this pair negotiates with.
    #[must_use]
    pub fn remote(&self) -> ClientId {
        self.remote
    }

    /// Attach an outbound track ahead of negotiation.
    pub async fn attach_track(&mut self, track: TrackHandle) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Err(NegotiationError::InvalidTransition {
                from: self.state,
                event: "attach_track",
            });
        }
        self.connection.add_track(track).await
    }

    /// Initiator: produce the local offer.
    ///
    /// The caller unicasts the returned description to the remote peer.
    pub async fn start_offer(&mut self) -> Result<SessionDescription, NegotiationError> {
        if self.state != PeerState::New {
            return Err(NegotiationError::InvalidTransition {
                from: self.state,
                event: "start_offer",
            });
        }

        let offer = self.connection.create_offer().await?;
        self.state = PeerState::OfferSent;

        debug!(
            target: "hud.mesh.peer",
            remote = %self.remote,
            "Offer produced"
        );

        Ok(offer)
    }

    /// Initiator: apply the remote answer, completing the pair.
    pub async fn accept_answer(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.state != PeerState::OfferSent {
            return Err(NegotiationError::InvalidTransition {
                from: self.state,
                event: "accept_answer",
            });
        }

        self.state = PeerState::AnswerPending;
        self.connection.set_remote_description(description).await?;
        self.remote_description_set = true;
        self.flush_pending_candidates().await?;
        self.state = PeerState::Connected;

        debug!(
            target: "hud.mesh.peer",
            remote = %self.remote,
            "Answer applied, pair connected"
        );

        Ok(())
    }

    /// Receiver: apply a remote offer and produce the answer.
    ///
    /// The caller unicasts the returned description back to the offerer.
    pub async fn accept_offer(
        &mut self,
        description: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        if self.state != PeerState::New {
            return Err(NegotiationError::InvalidTransition {
                from: self.state,
                event: "accept_offer",
            });
        }

        self.state = PeerState::OfferReceived;
        self.connection.set_remote_description(description).await?;
        self.remote_description_set = true;
        self.flush_pending_candidates().await?;

        self.state = PeerState::AnswerPending;
        let answer = self.connection.create_answer().await?;
        self.state = PeerState::Connected;

        debug!(
            target: "hud.mesh.peer",
            remote = %self.remote,
            "Offer answered, pair connected"
        );

        Ok(answer)
    }

    /// Apply one remote candidate, buffering it if the remote description
    /// has not been applied yet.
    ///
    /// A candidate that fails to apply is logged and dropped; connectivity
    /// can still establish through the remaining candidates, so a single
    /// bad line does not fail the pair.
    pub async fn accept_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            debug!(
                target: "hud.mesh.peer",
                remote = %self.remote,
                "Candidate for torn-down pair ignored"
            );
            return Ok(());
        }

        if self.remote_description_set {
            if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                warn!(
                    target: "hud.mesh.peer",
                    remote = %self.remote,
                    error = %e,
                    "Candidate rejected by connection"
                );
            }
        } else {
            self.pending_candidates.push(candidate);
            debug!(
                target: "hud.mesh.peer",
                remote = %self.remote,
                buffered = self.pending_candidates.len(),
                "Candidate buffered until remote description is set"
            );
        }

        Ok(())
    }

    /// Swap the outbound track of the same kind without renegotiating.
    ///
    /// No-op once the pair is terminal.
    pub async fn replace_outbound_track(
        &mut self,
        track: TrackHandle,
    ) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.connection.replace_outbound_track(track).await
    }

    /// Drive the pair into a terminal state, releasing the connection
    /// exactly once.
    ///
    /// Returns false when the pair was already terminal (repeated teardown
    /// signals are no-ops).
    pub async fn shut_down(&mut self, terminal: PeerState) -> bool {
        debug_assert!(terminal.is_terminal());

        if self.state.is_terminal() {
            return false;
        }

        self.connection.close().await;
        self.state = terminal;
        self.pending_candidates.clear();

        debug!(
            target: "hud.mesh.peer",
            remote = %self.remote,
            state = ?terminal,
            "Pair torn down"
        );

        true
    }

    /// Flush buffered candidates in arrival order.
    async fn flush_pending_candidates(&mut self) -> Result<(), NegotiationError> {
        if self.pending_candidates.is_empty() {
            return Ok(());
        }

        debug!(
            target: "hud.mesh.peer",
            remote = %self.remote,
            count = self.pending_candidates.len(),
            "Flushing buffered candidates"
        );

        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                warn!(
                    target: "hud.mesh.peer",
                    remote = %self.remote,
                    error = %e,
                    "Buffered candidate rejected by connection"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{candidate, MockCall, MockConnection};

    fn pair() -> (PeerNegotiation<MockConnection>, MockConnection) {
        let conn = MockConnection::new();
        let probe = conn.clone();
        (PeerNegotiation::new(ClientId::new(), conn), probe)
    }

    #[tokio::test]
    async fn test_initiator_flow_reaches_connected() {
        let (mut negotiation, probe) = pair();
        assert_eq!(negotiation.state(), PeerState::New);

        let offer = negotiation.start_offer().await.unwrap();
        assert_eq!(negotiation.state(), PeerState::OfferSent);
        assert!(offer.sdp.contains("offer"));

        negotiation
            .accept_answer(SessionDescription::new("answer-sdp"))
            .await
            .unwrap();
        assert_eq!(negotiation.state(), PeerState::Connected);

        assert_eq!(
            probe.calls(),
            vec![
                MockCall::CreateOffer,
                MockCall::SetRemoteDescription("answer-sdp".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_receiver_flow_reaches_connected() {
        let (mut negotiation, probe) = pair();

        let answer = negotiation
            .accept_offer(SessionDescription::new("offer-sdp"))
            .await
            .unwrap();
        assert_eq!(negotiation.state(), PeerState::Connected);
        assert!(answer.sdp.contains("answer"));

        assert_eq!(
            probe.calls(),
            vec![
                MockCall::SetRemoteDescription("offer-sdp".into()),
                MockCall::CreateAnswer,
            ]
        );
    }

    #[tokio::test]
    async fn test_premature_candidates_buffered_and_flushed_in_order() {
        let (mut negotiation, probe) = pair();
        negotiation.start_offer().await.unwrap();

        // Candidates race ahead of the answer: they must not hit the
        // connection yet.
        negotiation.accept_candidate(candidate("a")).await.unwrap();
        negotiation.accept_candidate(candidate("b")).await.unwrap();
        assert!(!probe
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::AddIceCandidate(_))));

        negotiation
            .accept_answer(SessionDescription::new("answer-sdp"))
            .await
            .unwrap();

        // Flushed in arrival order, right after the description applied.
        assert_eq!(
            probe.calls(),
            vec![
                MockCall::CreateOffer,
                MockCall::SetRemoteDescription("answer-sdp".into()),
                MockCall::AddIceCandidate("a".into()),
                MockCall::AddIceCandidate("b".into()),
            ]
        );

        // Late candidates now apply directly.
        negotiation.accept_candidate(candidate("c")).await.unwrap();
        assert_eq!(
            probe.calls().last(),
            Some(&MockCall::AddIceCandidate("c".into()))
        );
    }

    #[tokio::test]
    async fn test_receiver_buffers_candidates_arriving_before_offer_applied() {
        let (mut negotiation, probe) = pair();

        negotiation.accept_candidate(candidate("early")).await.unwrap();
        negotiation
            .accept_offer(SessionDescription::new("offer-sdp"))
            .await
            .unwrap();

        assert_eq!(
            probe.calls(),
            vec![
                MockCall::SetRemoteDescription("offer-sdp".into()),
                MockCall::AddIceCandidate("early".into()),
                MockCall::CreateAnswer,
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_transitions_rejected() {
        let (mut negotiation, _probe) = pair();
        negotiation.start_offer().await.unwrap();

        // A second offer on the same pair is a protocol violation.
        let result = negotiation.start_offer().await;
        assert!(matches!(
            result,
            Err(NegotiationError::InvalidTransition {
                from: PeerState::OfferSent,
                ..
            })
        ));

        // So is answering a pair that never offered.
        let (mut receiver, _probe) = pair();
        let result = receiver
            .accept_answer(SessionDescription::new("answer"))
            .await;
        assert!(matches!(
            result,
            Err(NegotiationError::InvalidTransition { from: PeerState::New, .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_closes_once() {
        let (mut negotiation, probe) = pair();
        negotiation.start_offer().await.unwrap();

        assert!(negotiation.shut_down(PeerState::Failed).await);
        assert_eq!(negotiation.state(), PeerState::Failed);

        // Repeated teardown signals are no-ops and do not close again.
        assert!(!negotiation.shut_down(PeerState::Closed).await);
        assert!(!negotiation.shut_down(PeerState::Disconnected).await);
        assert_eq!(negotiation.state(), PeerState::Failed);

        let closes = probe
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Close))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_candidate_after_teardown_is_noop() {
        let (mut negotiation, probe) = pair();
        negotiation.shut_down(PeerState::Closed).await;

        negotiation.accept_candidate(candidate("late")).await.unwrap();
        assert!(!probe
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::AddIceCandidate(_))));
    }

    #[tokio::test]
    async fn test_replace_track_noop_after_teardown() {
        let (mut negotiation, probe) = pair();
        negotiation.shut_down(PeerState::Disconnected).await;

        negotiation
            .replace_outbound_track(TrackHandle::new("screen-1", crate::TrackKind::Video))
            .await
            .unwrap();
        assert!(!probe
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::ReplaceTrack(_))));
    }

    #[tokio::test]
    async fn test_failed_description_surfaces_error() {
        let conn = MockConnection::new();
        conn.fail_next_set_remote("synthetic sdp parse failure");
        let mut negotiation = PeerNegotiation::new(ClientId::new(), conn);

        let result = negotiation
            .accept_offer(SessionDescription::new("bad-offer"))
            .await;
        assert!(matches!(result, Err(NegotiationError::Negotiation(_))));
    }
}
