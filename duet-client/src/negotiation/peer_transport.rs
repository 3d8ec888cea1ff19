use crate::config::IceConfig;
use crate::media::{LocalTrack, RemoteStream};
use crate::negotiation::NegotiationId;
use async_trait::async_trait;
use duet_core::{ConnectionId, IceCandidate, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone)]
pub enum PeerEventKind {
    LocalCandidate(IceCandidate),
    RemoteStream(RemoteStream),
    StateChanged(PeerConnectionState),
}

/// Something a peer connection reported, tagged with the negotiation that owns it.
#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub negotiation_id: NegotiationId,
    pub peer: ConnectionId,
    pub kind: PeerEventKind,
}

/// Hook target handed to a peer connection. Once detached, nothing it receives
/// reaches the controller.
#[derive(Clone)]
pub struct PeerEventSink {
    negotiation_id: NegotiationId,
    peer: ConnectionId,
    tx: mpsc::UnboundedSender<PeerEvent>,
    detached: Arc<AtomicBool>,
    first_stream_seen: Arc<AtomicBool>,
}

impl PeerEventSink {
    pub fn new(
        negotiation_id: NegotiationId,
        peer: ConnectionId,
        tx: mpsc::UnboundedSender<PeerEvent>,
    ) -> Self {
        Self {
            negotiation_id,
            peer,
            tx,
            detached: Arc::new(AtomicBool::new(false)),
            first_stream_seen: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn peer(&self) -> ConnectionId {
        self.peer
    }

    pub fn negotiation_id(&self) -> NegotiationId {
        self.negotiation_id
    }

    pub fn local_candidate(&self, candidate: IceCandidate) {
        self.forward(PeerEventKind::LocalCandidate(candidate));
    }

    /// Only the first remote stream of a connection is surfaced.
    pub fn remote_stream(&self, stream: RemoteStream) {
        if self.first_stream_seen.swap(true, Ordering::SeqCst) {
            debug!("Ignoring extra remote stream {} from {}", stream.stream_id, self.peer);
            return;
        }
        self.forward(PeerEventKind::RemoteStream(stream));
    }

    pub fn state_changed(&self, state: PeerConnectionState) {
        self.forward(PeerEventKind::StateChanged(state));
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    fn forward(&self, kind: PeerEventKind) {
        if self.is_detached() {
            return;
        }
        let _ = self.tx.send(PeerEvent {
            negotiation_id: self.negotiation_id,
            peer: self.peer,
            kind,
        });
    }
}

/// One live peer connection, seen as plain description and candidate operations.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> anyhow::Result<SessionDescription>;

    async fn create_answer(&self) -> anyhow::Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> anyhow::Result<()>;

    async fn set_remote_description(&self, description: SessionDescription)
    -> anyhow::Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Builds peer connections with local tracks attached and hooks wired to `hooks`.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        ice: &IceConfig,
        local_tracks: &[LocalTrack],
        hooks: PeerEventSink,
    ) -> anyhow::Result<Box<dyn PeerTransport>>;
}
