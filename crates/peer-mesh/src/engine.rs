//! Trait seams over the external media engine.
//!
//! Everything that touches a device or a wire lives behind these traits:
//! the session controller and peer tasks only ever see opaque track
//! handles, SDP text, and candidate lines. Tests drive the mesh with mock
//! implementations; production wires in the real RTC stack.
//!
//! Methods are declared as `impl Future + Send` so implementations can use
//! plain `async fn` while peer tasks stay spawnable on the multi-threaded
//! runtime.

use std::future::Future;

use common::ClientId;
use signal_protocol::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

use crate::errors::NegotiationError;

/// Kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Microphone or other audio source.
    Audio,
    /// Camera, screen capture, or other video source.
    Video,
}

/// Opaque handle naming a track inside the external engine.
///
/// The same handle can be attached to many peer connections; the engine
/// owns the underlying source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHandle {
    /// Engine-assigned track id.
    pub id: String,
    /// What the track carries.
    pub kind: TrackKind,
}

impl TrackHandle {
    /// Create a handle.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Transport-level state of one peer connection, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Media is flowing.
    Connected,
    /// Connectivity lost, may recover.
    Disconnected,
    /// Connectivity lost for good.
    Failed,
    /// Closed locally or by the peer.
    Closed,
}

impl TransportState {
    /// Whether this state ends the peer pair.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed
        )
    }
}

/// Asynchronous signals produced by one peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// The local agent discovered a connectivity candidate; trickle it to
    /// the peer immediately.
    Candidate(IceCandidate),
    /// The transport changed state.
    StateChanged(TransportState),
}

/// One direct media connection to a remote peer.
///
/// Implemented by the external RTC engine. All methods are driven from the
/// single peer task that owns the connection, so implementations never see
/// concurrent calls.
pub trait MediaConnection: Send + 'static {
    /// Produce a local offer description.
    fn create_offer(
        &mut self,
    ) -> impl Future<Output = Result<SessionDescription, NegotiationError>> + Send;

    /// Apply the remote side's description (offer or answer).
    fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> impl Future<Output = Result<(), NegotiationError>> + Send;

    /// Produce an answer to a previously applied remote offer.
    fn create_answer(
        &mut self,
    ) -> impl Future<Output = Result<SessionDescription, NegotiationError>> + Send;

    /// Apply one remote connectivity candidate.
    fn add_ice_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> impl Future<Output = Result<(), NegotiationError>> + Send;

    /// Attach an outbound track before negotiation.
    fn add_track(
        &mut self,
        track: TrackHandle,
    ) -> impl Future<Output = Result<(), NegotiationError>> + Send;

    /// Swap the outbound track of the same kind in place, without
    /// renegotiating the session description.
    fn replace_outbound_track(
        &mut self,
        track: TrackHandle,
    ) -> impl Future<Output = Result<(), NegotiationError>> + Send;

    /// Release the connection's resources. Must be safe to call once per
    /// connection; the state machine guarantees it is not called twice.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Factory producing one [`MediaConnection`] per remote peer, plus the
/// stream of signals that connection will emit.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Concrete connection type.
    type Connection: MediaConnection;

    /// Open a connection object toward `remote`.
    #[allow(clippy::type_complexity)]
    fn connect(
        &self,
        remote: ClientId,
    ) -> impl Future<
        Output = Result<(Self::Connection, mpsc::Receiver<ConnectionSignal>), NegotiationError>,
    > + Send;
}

/// Local capture owned by the external engine.
pub trait LocalMedia: Send + Sync + 'static {
    /// Acquire the default outbound tracks (camera + microphone).
    ///
    /// Failure here is a [`NegotiationError::MediaAcquisition`] and leaves
    /// all room state untouched.
    fn acquire(&self) -> impl Future<Output = Result<Vec<TrackHandle>, NegotiationError>> + Send;

    /// Acquire a screen-capture video track.
    fn acquire_screen(
        &self,
    ) -> impl Future<Output = Result<TrackHandle, NegotiationError>> + Send;

    /// Enable or disable the local tracks of one kind (mute/unmute,
    /// camera on/off). Applies at the source, so every peer connection
    /// sees it without renegotiation.
    fn set_enabled(
        &self,
        kind: TrackKind,
        enabled: bool,
    ) -> impl Future<Output = Result<(), NegotiationError>> + Send;
}
