use crate::channel::{ChannelEvent, SignalingOutput};
use crate::config::SessionConfig;
use crate::error::NegotiationError;
use crate::media::LocalTrack;
use crate::negotiation::{
    NegotiationRole, NegotiationSession, NegotiationTable, PeerConnectionState, PeerConnector,
    PeerEvent, PeerEventKind,
};
use crate::room::{JoinOutcome, RoomState};
use crate::session::{
    NegotiationStatus, NoopObserver, RejectionReason, SessionCommand, SessionHandle,
    SessionObserver, SessionPhase, SessionStatus,
};
use duet_core::{
    ClientMessage, ConnectionId, JoinRequest, Participant, PersistentId, RecordingState,
    RecordingStatus, RoomSnapshot, ServerMessage, SessionDescription, SessionId,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Session lifecycle actor.
///
/// Owns the room mirror and every negotiation. Coordinator events, peer
/// connection hooks and handle commands are consumed one at a time, each to
/// completion, so no state here needs locking.
pub struct SessionController {
    config: SessionConfig,
    phase: SessionPhase,
    /// Join intent; replayed when a fresh transport comes up.
    wants_join: bool,
    room: RoomState,
    negotiations: NegotiationTable,
    signaling: Arc<dyn SignalingOutput>,
    connector: Arc<dyn PeerConnector>,
    local_tracks: Vec<LocalTrack>,
    observer: Arc<dyn SessionObserver>,
    channel_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    command_rx: mpsc::Receiver<SessionCommand>,
    peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        signaling: Arc<dyn SignalingOutput>,
        connector: Arc<dyn PeerConnector>,
        local_tracks: Vec<LocalTrack>,
        channel_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();

        let controller = Self {
            room: RoomState::new(config.session_id.clone()),
            config,
            phase: SessionPhase::Disconnected,
            wants_join: false,
            negotiations: NegotiationTable::new(),
            signaling,
            connector,
            local_tracks,
            observer: Arc::new(NoopObserver),
            channel_rx,
            command_rx,
            peer_rx,
            peer_tx,
        };

        (controller, SessionHandle::new(command_tx))
    }

    pub async fn run(mut self) {
        info!("Session controller for {} started", self.config.session_id);

        loop {
            tokio::select! {
                biased;

                Some(event) = self.peer_rx.recv() => self.handle_peer_event(event).await,

                event = self.channel_rx.recv() => match event {
                    Some(e) => self.handle_channel_event(e).await,
                    None => {
                        info!("Rendezvous channel released. Stopping session controller.");
                        break;
                    }
                },

                cmd = self.command_rx.recv() => match cmd {
                    Some(c) => self.handle_command(c).await,
                    None => {
                        info!("All session handles dropped. Stopping session controller.");
                        break;
                    }
                },
            }
        }

        self.teardown().await;
        info!("Session controller for {} finished", self.config.session_id);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join => self.join().await,
            SessionCommand::Leave => self.leave().await,
            SessionCommand::StartRecording => {
                let session_id = self.config.session_id.clone();
                self.request_recording(ClientMessage::StartRecording { session_id })
                    .await
            }
            SessionCommand::StopRecording => {
                let session_id = self.config.session_id.clone();
                self.request_recording(ClientMessage::StopRecording { session_id })
                    .await
            }
            SessionCommand::SetObserver(observer) => {
                debug!("Session observer replaced");
                self.observer = observer;
            }
            SessionCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    async fn join(&mut self) {
        // Only an explicit join clears a rejection; automatic paths never do.
        if let SessionPhase::Rejected(reason) = self.phase {
            info!("Retrying join after {:?}", reason);
            self.phase = SessionPhase::Disconnected;
            self.signaling.reconnect();
        }

        self.wants_join = true;
        if self.phase != SessionPhase::Disconnected {
            debug!("Join already in flight ({:?}), not re-emitting", self.phase);
            return;
        }
        self.emit_join().await;
    }

    async fn emit_join(&mut self) {
        info!(
            "Joining session {} as {} ({})",
            self.config.session_id, self.config.persistent_id, self.config.role
        );
        let request = JoinRequest {
            session_id: self.config.session_id.clone(),
            role: self.config.role,
            persistent_id: self.config.persistent_id.clone(),
            email: self.config.email.clone(),
        };
        self.signaling.emit(ClientMessage::Join(request)).await;
        self.phase = SessionPhase::Joining;
    }

    async fn leave(&mut self) {
        self.wants_join = false;
        if matches!(self.phase, SessionPhase::Joining | SessionPhase::Joined) {
            info!("Leaving session {}", self.config.session_id);
            self.signaling.emit(ClientMessage::Leave {}).await;
        }

        self.teardown().await;
        if !self.is_rejected() {
            self.phase = SessionPhase::Disconnected;
        }
        self.notify_snapshot();
    }

    async fn request_recording(&mut self, message: ClientMessage) {
        if self.phase != SessionPhase::Joined {
            warn!("Ignoring {} request while {:?}", message.name(), self.phase);
            return;
        }
        self.signaling.emit(message).await;
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                debug!("Rendezvous transport up");
                if self.wants_join && self.phase == SessionPhase::Disconnected {
                    self.emit_join().await;
                }
            }
            ChannelEvent::Disconnected => {
                warn!("Rendezvous transport lost, discarding negotiation state");
                self.teardown().await;
                if !self.is_rejected() {
                    self.phase = SessionPhase::Disconnected;
                }
                self.notify_snapshot();
            }
            ChannelEvent::Message(message) => self.handle_server_message(message).await,
        }
    }

    async fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::FullState(snapshot) => self.on_full_state(snapshot).await,
            ServerMessage::PeerJoined(participant) => self.on_peer_joined(participant).await,
            ServerMessage::PeerLeft { persistent_id } => self.on_peer_left(&persistent_id).await,
            ServerMessage::PeerReconnected {
                persistent_id,
                new_connection_id,
            } => {
                self.on_peer_reconnected(&persistent_id, new_connection_id)
                    .await
            }
            ServerMessage::RoomFull {} => self.reject(RejectionReason::RoomFull).await,
            ServerMessage::DuplicateSession {} => {
                self.reject(RejectionReason::DuplicateSession).await
            }
            ServerMessage::Offer { from, description } => self.on_offer(from, description).await,
            ServerMessage::Answer { from, description } => self.on_answer(from, description).await,
            ServerMessage::IceCandidate { from, candidate } => {
                let Some(session) = self.negotiations.by_peer_mut(&from) else {
                    debug!("Dropping candidate from {:?}: no negotiation", from);
                    return;
                };
                if let Err(e) = session.receive_ice_candidate(candidate).await {
                    debug!("Dropping candidate from {:?}: {}", from, e);
                }
            }
            ServerMessage::RecordingStarted {
                session_id,
                started_at,
            } => self.on_recording(session_id, RecordingStatus::Recording, started_at),
            ServerMessage::RecordingStopped {
                session_id,
                started_at,
            } => self.on_recording(session_id, RecordingStatus::Idle, started_at),
            ServerMessage::Error { message } => warn!("Coordinator error: {}", message),
        }
    }

    async fn on_full_state(&mut self, snapshot: RoomSnapshot) {
        if snapshot.session_id != self.config.session_id {
            warn!(
                "Ignoring full-state for {} (joined {})",
                snapshot.session_id, self.config.session_id
            );
            return;
        }
        if self.is_rejected() {
            debug!("Ignoring full-state after rejection");
            return;
        }

        self.room.apply_full_snapshot(snapshot);
        self.phase = SessionPhase::Joined;
        info!(
            "Joined {} with {} participant(s)",
            self.config.session_id,
            self.room.snapshot().participants.len()
        );

        let others: Vec<ConnectionId> = self
            .room
            .snapshot()
            .others(&self.config.persistent_id)
            .map(|p| p.connection_id)
            .collect();

        for peer in self.negotiations.peers() {
            if !others.contains(&peer) {
                self.close_negotiation(&peer, PeerConnectionState::Closed)
                    .await;
            }
        }
        // Peers already present will offer; be ready to buffer their candidates.
        for peer in others {
            if self.negotiations.by_peer(&peer).is_none() {
                self.start_negotiation(peer, NegotiationRole::Responder)
                    .await;
            }
        }

        self.notify_snapshot();
    }

    async fn on_peer_joined(&mut self, participant: Participant) {
        if participant.persistent_id == self.config.persistent_id {
            debug!("Ignoring peer-joined for ourselves");
            return;
        }

        let peer = participant.connection_id;
        info!("Peer {} joined as {:?}", participant.persistent_id, peer);
        if self.room.apply_join(participant) != JoinOutcome::Inserted {
            return;
        }
        self.notify_snapshot();

        if self.phase == SessionPhase::Joined {
            self.start_initiator(peer).await;
        }
    }

    async fn on_peer_left(&mut self, persistent_id: &PersistentId) {
        match self.room.apply_leave(persistent_id) {
            Some(participant) => {
                info!("Peer {} left", persistent_id);
                self.close_negotiation(&participant.connection_id, PeerConnectionState::Closed)
                    .await;
                self.notify_snapshot();
            }
            None => debug!("peer-left for {} who is not in the room", persistent_id),
        }
    }

    async fn on_peer_reconnected(&mut self, persistent_id: &PersistentId, new_connection_id: ConnectionId) {
        if persistent_id == &self.config.persistent_id {
            debug!("Ignoring peer-reconnected for ourselves");
            return;
        }

        let Some(old) = self.room.apply_reconnect(persistent_id, new_connection_id) else {
            warn!("peer-reconnected for {} who is not in the room", persistent_id);
            return;
        };
        info!(
            "Peer {} reconnected: {:?} -> {:?}",
            persistent_id, old, new_connection_id
        );

        self.close_negotiation(&old, PeerConnectionState::Closed).await;
        self.notify_snapshot();

        if self.phase == SessionPhase::Joined {
            self.start_initiator(new_connection_id).await;
        }
    }

    async fn on_offer(&mut self, from: ConnectionId, description: SessionDescription) {
        if self.negotiations.by_peer(&from).is_none() {
            let is_member = self
                .room
                .snapshot()
                .by_connection(&from)
                .is_some_and(|p| p.persistent_id != self.config.persistent_id);
            if !is_member {
                debug!("Dropping offer from {:?}: not a room member", from);
                return;
            }
            if !self
                .start_negotiation(from, NegotiationRole::Responder)
                .await
            {
                return;
            }
        }

        let signaling = self.signaling.clone();
        let Some(session) = self.negotiations.by_peer_mut(&from) else {
            return;
        };
        let result = session.receive_offer(description, signaling.as_ref()).await;
        if let Err(e) = result {
            self.on_negotiation_error(from, "offer", e).await;
        }
    }

    async fn on_answer(&mut self, from: ConnectionId, description: SessionDescription) {
        let Some(session) = self.negotiations.by_peer_mut(&from) else {
            debug!("Dropping answer from {:?}: no negotiation", from);
            return;
        };
        let result = session.receive_answer(description).await;
        if let Err(e) = result {
            self.on_negotiation_error(from, "answer", e).await;
        }
    }

    fn on_recording(&mut self, session_id: SessionId, status: RecordingStatus, started_at: Option<i64>) {
        if session_id != self.config.session_id {
            warn!("Ignoring recording event for session {}", session_id);
            return;
        }
        info!("Recording is now {:?}", status);
        let started_at = match status {
            RecordingStatus::Recording => started_at,
            RecordingStatus::Idle => None,
        };
        self.room.apply_recording(RecordingState {
            session_id,
            status,
            started_at,
        });
        self.notify_snapshot();
    }

    async fn reject(&mut self, reason: RejectionReason) {
        self.signaling.disable_auto_reconnect();
        warn!("Join to {} rejected: {:?}", self.config.session_id, reason);

        self.wants_join = false;
        self.teardown().await;
        self.phase = SessionPhase::Rejected(reason);
        self.observer.on_rejected(reason);
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        let PeerEvent {
            negotiation_id,
            peer,
            kind,
        } = event;

        let Some(session) = self.negotiations.get_mut(negotiation_id) else {
            debug!("Ignoring event from stale negotiation {}", negotiation_id);
            return;
        };

        match kind {
            PeerEventKind::LocalCandidate(candidate) => {
                self.signaling.send_ice(peer, candidate).await;
            }
            PeerEventKind::RemoteStream(stream) => {
                info!("Remote stream {} from {:?}", stream.stream_id, peer);
                self.observer.on_remote_stream(peer, stream);
            }
            PeerEventKind::StateChanged(state) => {
                session.on_connection_state(state);
                self.observer.on_connection_state_change(peer, state);
            }
        }
    }

    /// Returns whether a session for `peer` now exists.
    async fn start_negotiation(&mut self, peer: ConnectionId, role: NegotiationRole) -> bool {
        let id = self.negotiations.allocate_id();
        let created = NegotiationSession::create(
            id,
            peer,
            role,
            self.connector.as_ref(),
            &self.config.ice,
            &self.local_tracks,
            self.peer_tx.clone(),
        )
        .await;

        match created {
            Ok(session) => {
                if let Some(mut replaced) = self.negotiations.insert(session) {
                    replaced.close().await;
                }
                true
            }
            Err(e) => {
                error!("Failed to create peer connection for {:?}: {}", peer, e);
                self.observer
                    .on_connection_state_change(peer, PeerConnectionState::Failed);
                false
            }
        }
    }

    async fn start_initiator(&mut self, peer: ConnectionId) {
        if !self
            .start_negotiation(peer, NegotiationRole::Initiator)
            .await
        {
            return;
        }

        let signaling = self.signaling.clone();
        let Some(session) = self.negotiations.by_peer_mut(&peer) else {
            return;
        };
        let result = session.send_offer(signaling.as_ref()).await;
        if let Err(e) = result {
            self.on_negotiation_error(peer, "send offer", e).await;
        }
    }

    /// Protocol violations are logged; a failing peer connection is torn down
    /// and surfaced as failed.
    async fn on_negotiation_error(&mut self, peer: ConnectionId, step: &str, e: NegotiationError) {
        match e {
            NegotiationError::Transport(_) => {
                error!("Negotiation with {:?} failed at {}: {}", peer, step, e);
                self.close_negotiation(&peer, PeerConnectionState::Failed)
                    .await;
            }
            other => warn!("Rejected {} for {:?}: {}", step, peer, other),
        }
    }

    async fn close_negotiation(&mut self, peer: &ConnectionId, reported: PeerConnectionState) {
        if let Some(mut session) = self.negotiations.remove_peer(peer) {
            session.close().await;
            self.observer.on_connection_state_change(*peer, reported);
        }
    }

    async fn teardown(&mut self) {
        for mut session in self.negotiations.drain() {
            let peer = session.peer();
            session.close().await;
            self.observer
                .on_connection_state_change(peer, PeerConnectionState::Closed);
        }
        self.room.reset();
    }

    fn notify_snapshot(&self) {
        self.observer.on_room_snapshot_changed(self.room.snapshot());
    }

    fn is_rejected(&self) -> bool {
        matches!(self.phase, SessionPhase::Rejected(_))
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            snapshot: self.room.snapshot().clone(),
            negotiations: self
                .negotiations
                .iter()
                .map(|s| NegotiationStatus {
                    peer: s.peer(),
                    role: s.role(),
                    phase: s.phase(),
                    pending_candidates: s.pending_len(),
                })
                .collect(),
        }
    }
}
