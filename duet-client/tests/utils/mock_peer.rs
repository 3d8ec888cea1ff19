use async_trait::async_trait;
use duet_client::{
    IceConfig, LocalTrack, NegotiationId, PeerConnectionState, PeerConnector, PeerEventSink,
    PeerTransport, RemoteStream,
};
use duet_core::{ConnectionId, IceCandidate, SessionDescription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared view of one in-memory peer connection.
pub struct MockTransportState {
    pub peer: ConnectionId,
    pub negotiation_id: NegotiationId,
    hooks: PeerEventSink,
    emit_local_candidate: bool,
    local_set: AtomicBool,
    remote_set: AtomicBool,
    connected: AtomicBool,
    closed: AtomicBool,
    applied: Mutex<Vec<String>>,
}

impl MockTransportState {
    pub fn applied_candidates(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn remote_set(&self) -> bool {
        self.remote_set.load(Ordering::SeqCst)
    }

    /// Deliver a hook event as if the native connection fired it.
    pub fn fire_state(&self, state: PeerConnectionState) {
        self.hooks.state_changed(state);
    }

    pub fn fire_local_candidate(&self, candidate: &str) {
        self.hooks.local_candidate(IceCandidate::new(candidate));
    }

    fn maybe_connect(&self) {
        if !(self.local_set.load(Ordering::SeqCst) && self.remote_set.load(Ordering::SeqCst)) {
            return;
        }
        if self.connected.swap(true, Ordering::SeqCst) {
            return;
        }
        self.hooks.state_changed(PeerConnectionState::Connecting);
        self.hooks.state_changed(PeerConnectionState::Connected);
        self.hooks.remote_stream(RemoteStream {
            stream_id: format!("stream-{}", self.peer),
            track_id: format!("audio-{}", self.peer),
            track: None,
        });
    }
}

struct MockTransport {
    state: Arc<MockTransportState>,
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn create_offer(&self) -> anyhow::Result<SessionDescription> {
        Ok(SessionDescription::offer(format!(
            "v=0 offer {}",
            self.state.negotiation_id
        )))
    }

    async fn create_answer(&self) -> anyhow::Result<SessionDescription> {
        if !self.state.remote_set() {
            anyhow::bail!("cannot answer without a remote offer");
        }
        Ok(SessionDescription::answer(format!(
            "v=0 answer {}",
            self.state.negotiation_id
        )))
    }

    async fn set_local_description(&self, _description: SessionDescription) -> anyhow::Result<()> {
        self.state.local_set.store(true, Ordering::SeqCst);
        if self.state.emit_local_candidate {
            self.state
                .fire_local_candidate(&format!("candidate:local-{}", self.state.negotiation_id));
        }
        self.state.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(&self, _description: SessionDescription) -> anyhow::Result<()> {
        self.state.remote_set.store(true, Ordering::SeqCst);
        self.state.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()> {
        if !self.state.remote_set() {
            anyhow::bail!("candidate applied before remote description");
        }
        if candidate.candidate.contains("bad") {
            anyhow::bail!("malformed candidate '{}'", candidate.candidate);
        }
        self.state.applied.lock().unwrap().push(candidate.candidate);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Produces deterministic in-memory transports and remembers every one of them.
#[derive(Clone, Default)]
pub struct MockPeerConnector {
    emit_local_candidate: bool,
    transports: Arc<Mutex<Vec<Arc<MockTransportState>>>>,
}

impl MockPeerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each transport reports one local candidate when its local description is set.
    pub fn with_local_candidates() -> Self {
        Self {
            emit_local_candidate: true,
            ..Self::default()
        }
    }

    pub fn transports(&self) -> Vec<Arc<MockTransportState>> {
        self.transports.lock().unwrap().clone()
    }

    pub fn transports_for(&self, peer: &ConnectionId) -> Vec<Arc<MockTransportState>> {
        self.transports()
            .into_iter()
            .filter(|t| &t.peer == peer)
            .collect()
    }

    pub fn latest_for(&self, peer: &ConnectionId) -> Option<Arc<MockTransportState>> {
        self.transports_for(peer).pop()
    }
}

#[async_trait]
impl PeerConnector for MockPeerConnector {
    async fn connect(
        &self,
        _ice: &IceConfig,
        _local_tracks: &[LocalTrack],
        hooks: PeerEventSink,
    ) -> anyhow::Result<Box<dyn PeerTransport>> {
        let state = Arc::new(MockTransportState {
            peer: hooks.peer(),
            negotiation_id: hooks.negotiation_id(),
            hooks,
            emit_local_candidate: self.emit_local_candidate,
            local_set: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            applied: Mutex::new(Vec::new()),
        });
        self.transports.lock().unwrap().push(state.clone());
        Ok(Box::new(MockTransport { state }))
    }
}
