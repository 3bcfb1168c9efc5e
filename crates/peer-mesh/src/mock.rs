//! Mock media engine for tests.
//!
//! `MockConnection` records every call against it and can be cloned into a
//! probe handle, so a test can hand the connection to the state machine and
//! still observe what happened to it. `MockFactory` and `MockMedia` stand
//! in for the engine-side traits.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use common::ClientId;
use signal_protocol::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

use crate::engine::{
    ConnectionFactory, ConnectionSignal, LocalMedia, MediaConnection, TrackHandle, TrackKind,
};
use crate::errors::NegotiationError;

/// One recorded call against a mock connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CreateOffer,
    CreateAnswer,
    SetRemoteDescription(String),
    AddIceCandidate(String),
    AddTrack(String),
    ReplaceTrack(String),
    Close,
}

#[derive(Default)]
struct MockConnectionState {
    calls: Vec<MockCall>,
    fail_next_set_remote: Option<String>,
    fail_next_offer: Option<String>,
}

/// A recording fake of one peer connection.
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockConnectionState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything called on this connection so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Make the next `set_remote_description` fail.
    pub fn fail_next_set_remote(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_set_remote = Some(reason.to_string());
    }

    /// Make the next `create_offer` fail.
    pub fn fail_next_offer(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_offer = Some(reason.to_string());
    }

    fn record(&self, call: MockCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl MediaConnection for MockConnection {
    async fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError> {
        if let Some(reason) = self.state.lock().unwrap().fail_next_offer.take() {
            return Err(NegotiationError::Negotiation(reason));
        }
        self.record(MockCall::CreateOffer);
        Ok(SessionDescription::new("mock-offer"))
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if let Some(reason) = self.state.lock().unwrap().fail_next_set_remote.take() {
            return Err(NegotiationError::Negotiation(reason));
        }
        self.record(MockCall::SetRemoteDescription(description.sdp));
        Ok(())
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, NegotiationError> {
        self.record(MockCall::CreateAnswer);
        Ok(SessionDescription::new("mock-answer"))
    }

    async fn add_ice_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> Result<(), NegotiationError> {
        self.record(MockCall::AddIceCandidate(candidate.candidate));
        Ok(())
    }

    async fn add_track(&mut self, track: TrackHandle) -> Result<(), NegotiationError> {
        self.record(MockCall::AddTrack(track.id));
        Ok(())
    }

    async fn replace_outbound_track(
        &mut self,
        track: TrackHandle,
    ) -> Result<(), NegotiationError> {
        self.record(MockCall::ReplaceTrack(track.id));
        Ok(())
    }

    async fn close(&mut self) {
        self.record(MockCall::Close);
    }
}

#[derive(Default)]
struct MockFactoryState {
    /// Probe handles for every connection created, by remote peer.
    connections: HashMap<ClientId, MockConnection>,
    /// Signal injectors for every connection created, by remote peer.
    signals: HashMap<ClientId, mpsc::Sender<ConnectionSignal>>,
}

/// Factory producing recording connections and exposing their probes.
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<Mutex<MockFactoryState>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Probe handle for the connection created toward `remote`.
    pub fn connection(&self, remote: ClientId) -> Option<MockConnection> {
        self.state.lock().unwrap().connections.get(&remote).cloned()
    }

    /// Remotes a connection was created toward, in no particular order.
    pub fn remotes(&self) -> Vec<ClientId> {
        self.state.lock().unwrap().connections.keys().copied().collect()
    }

    /// Inject an engine signal into the connection toward `remote`.
    pub async fn inject_signal(&self, remote: ClientId, signal: ConnectionSignal) {
        let sender = self
            .state
            .lock()
            .unwrap()
            .signals
            .get(&remote)
            .cloned()
            .expect("no connection toward remote");
        sender.send(signal).await.expect("signal channel closed");
    }
}

impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn connect(
        &self,
        remote: ClientId,
    ) -> Result<(Self::Connection, mpsc::Receiver<ConnectionSignal>), NegotiationError> {
        let connection = MockConnection::new();
        let (signal_tx, signal_rx) = mpsc::channel(32);

        let mut state = self.state.lock().unwrap();
        state.connections.insert(remote, connection.clone());
        state.signals.insert(remote, signal_tx);

        Ok((connection, signal_rx))
    }
}

#[derive(Default)]
struct MockMediaState {
    fail_acquire: Option<String>,
    enabled_calls: Vec<(TrackKind, bool)>,
}

/// Fake local capture.
#[derive(Clone, Default)]
pub struct MockMedia {
    state: Arc<Mutex<MockMediaState>>,
}

impl MockMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let media = Self::default();
        media.state.lock().unwrap().fail_acquire = Some(reason.to_string());
        Arc::new(media)
    }

    pub fn enabled_calls(&self) -> Vec<(TrackKind, bool)> {
        self.state.lock().unwrap().enabled_calls.clone()
    }
}

impl LocalMedia for MockMedia {
    async fn acquire(&self) -> Result<Vec<TrackHandle>, NegotiationError> {
        if let Some(reason) = self.state.lock().unwrap().fail_acquire.take() {
            return Err(NegotiationError::MediaAcquisition(reason));
        }
        Ok(vec![
            TrackHandle::new("mic-0", TrackKind::Audio),
            TrackHandle::new("cam-0", TrackKind::Video),
        ])
    }

    async fn acquire_screen(&self) -> Result<TrackHandle, NegotiationError> {
        Ok(TrackHandle::new("screen-0", TrackKind::Video))
    }

    async fn set_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), NegotiationError> {
        self.state.lock().unwrap().enabled_calls.push((kind, enabled));
        Ok(())
    }
}

/// Candidate literal helper.
pub fn candidate(label: &str) -> IceCandidate {
    IceCandidate {
        candidate: label.to_string(),
        sdp_mid: None,
        sdp_mline_index: None,
    }
}
