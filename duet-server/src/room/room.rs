use crate::config::CoordinatorConfig;
use crate::room::room_command::{GraceExpired, RoomCommand};
use crate::room::room_manager::RoomRegistry;
use crate::signaling::SignalingOutput;
use duet_core::utils::now_millis;
use duet_core::{
    ClientMessage, ConnectionId, JoinRequest, Participant, PersistentId, RecordingState,
    RecordingStatus, Role, RoomSnapshot, ServerMessage, SessionId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

struct Member {
    participant: Participant,
    live: bool,
    /// Bumped on every disconnect and rebind so stale grace timers are ignored.
    generation: u64,
}

/// Authoritative state of one session: who is in it and whether it records.
pub struct Room {
    session_id: SessionId,
    members: Vec<Member>,
    recording: RecordingState,
    config: CoordinatorConfig,
    command_rx: mpsc::Receiver<RoomCommand>,
    timer_rx: mpsc::UnboundedReceiver<GraceExpired>,
    timer_tx: mpsc::UnboundedSender<GraceExpired>,
    signaling: Arc<dyn SignalingOutput>,
    /// Set when a manager owns this room; lets an idle room drop itself.
    registry: Option<RoomRegistry>,
}

impl Room {
    pub fn new(
        session_id: SessionId,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        config: CoordinatorConfig,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Self {
            recording: RecordingState::idle(session_id.clone()),
            session_id,
            members: Vec::new(),
            config,
            command_rx,
            timer_rx,
            timer_tx,
            signaling,
            registry: None,
        }
    }

    pub(crate) fn registered_in(mut self, registry: RoomRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.session_id);

        // `interval` panics on a zero period.
        let period = self.config.idle_room_sweep.max(Duration::from_millis(1));
        let mut sweep = tokio::time::interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down room.");
                            break;
                        }
                    }
                }

                Some(expired) = self.timer_rx.recv() => {
                    self.handle_grace_expired(expired).await;
                }

                _ = sweep.tick() => {
                    if self.try_retire() {
                        info!("Room {} is idle, retiring it", self.session_id);
                        break;
                    }
                }
            }
        }

        info!("Room {} event loop finished", self.session_id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                connection_id,
                request,
            } => self.handle_join(connection_id, request).await,

            RoomCommand::Signal {
                connection_id,
                message,
            } => self.handle_signal(connection_id, message).await,

            RoomCommand::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id).await
            }
        }
    }

    async fn handle_join(&mut self, connection_id: ConnectionId, request: JoinRequest) {
        if request.session_id != self.session_id {
            warn!(
                "Join for {} delivered to room {}",
                request.session_id, self.session_id
            );
            self.send_error(connection_id, "wrong session").await;
            return;
        }

        let pid = request.persistent_id.clone();
        info!("Processing join of {} on {:?}", pid, connection_id);

        // A socket that joins under a new identity gives up its old one.
        if let Some(previous) = self
            .members
            .iter()
            .find(|m| m.participant.connection_id == connection_id && m.participant.persistent_id != pid)
            .map(|m| m.participant.persistent_id.clone())
        {
            self.remove_member(&previous).await;
        }

        if let Some(idx) = self.position(&pid) {
            let member = &self.members[idx];
            let current = member.participant.connection_id;

            if member.live && current == connection_id {
                debug!("{} joined again on the same connection", pid);
                self.signaling
                    .send(connection_id, ServerMessage::FullState(self.snapshot()))
                    .await;
                return;
            }

            if member.live && self.signaling.is_connected(&current) {
                info!("{} is already connected on {:?}", pid, current);
                self.signaling
                    .send(connection_id, ServerMessage::DuplicateSession {})
                    .await;
                self.signaling.close(connection_id).await;
                return;
            }

            self.rebind(idx, connection_id, request).await;
            return;
        }

        if self.members.len() >= self.config.max_participants {
            info!("Room {} is full, rejecting {}", self.session_id, pid);
            self.signaling
                .send(connection_id, ServerMessage::RoomFull {})
                .await;
            self.signaling.close(connection_id).await;
            return;
        }

        let participant = Participant {
            connection_id,
            persistent_id: pid,
            role: request.role,
            email: request.email,
        };
        self.members.push(Member {
            participant: participant.clone(),
            live: true,
            generation: 0,
        });

        self.signaling
            .send(connection_id, ServerMessage::FullState(self.snapshot()))
            .await;
        self.broadcast_except(
            &participant.persistent_id,
            ServerMessage::PeerJoined(participant.clone()),
        )
        .await;
    }

    /// Move a known identity onto a new connection.
    async fn rebind(&mut self, idx: usize, connection_id: ConnectionId, request: JoinRequest) {
        let member = &mut self.members[idx];
        let old = member.participant.connection_id;
        member.participant.connection_id = connection_id;
        member.participant.role = request.role;
        member.participant.email = request.email;
        member.live = true;
        member.generation += 1;

        let pid = member.participant.persistent_id.clone();
        info!("{} reconnected: {:?} -> {:?}", pid, old, connection_id);

        self.signaling
            .send(connection_id, ServerMessage::FullState(self.snapshot()))
            .await;
        self.broadcast_except(
            &pid,
            ServerMessage::PeerReconnected {
                persistent_id: pid.clone(),
                new_connection_id: connection_id,
            },
        )
        .await;
    }

    async fn handle_signal(&mut self, connection_id: ConnectionId, message: ClientMessage) {
        let Some(sender) = self
            .members
            .iter()
            .find(|m| m.live && m.participant.connection_id == connection_id)
            .map(|m| m.participant.clone())
        else {
            debug!(
                "Dropping '{}' from non-member {:?}",
                message.name(),
                connection_id
            );
            self.send_error(connection_id, "not a member of this session")
                .await;
            return;
        };

        match message {
            ClientMessage::Join(_) => {
                warn!("Join routed as a signal from {:?}", connection_id);
            }

            ClientMessage::Offer {
                target,
                description,
            } => {
                self.relay(
                    &sender,
                    target,
                    ServerMessage::Offer {
                        from: connection_id,
                        description,
                    },
                )
                .await
            }

            ClientMessage::Answer {
                target,
                description,
            } => {
                self.relay(
                    &sender,
                    target,
                    ServerMessage::Answer {
                        from: connection_id,
                        description,
                    },
                )
                .await
            }

            ClientMessage::IceCandidate { target, candidate } => {
                self.relay(
                    &sender,
                    target,
                    ServerMessage::IceCandidate {
                        from: connection_id,
                        candidate,
                    },
                )
                .await
            }

            ClientMessage::StartRecording { session_id } => {
                if !self.check_recording_request(&sender, &session_id).await {
                    return;
                }
                if self.recording.is_recording() {
                    debug!("Room {} is already recording", self.session_id);
                    return;
                }

                let started_at = now_millis();
                self.recording = RecordingState {
                    session_id: self.session_id.clone(),
                    status: RecordingStatus::Recording,
                    started_at: Some(started_at),
                };
                info!("Room {} started recording", self.session_id);
                self.broadcast(ServerMessage::RecordingStarted {
                    session_id: self.session_id.clone(),
                    started_at: Some(started_at),
                })
                .await;
            }

            ClientMessage::StopRecording { session_id } => {
                if !self.check_recording_request(&sender, &session_id).await {
                    return;
                }
                if !self.recording.is_recording() {
                    debug!("Room {} is not recording", self.session_id);
                    return;
                }

                let started_at = self.recording.started_at;
                self.recording = RecordingState::idle(self.session_id.clone());
                info!("Room {} stopped recording", self.session_id);
                self.broadcast(ServerMessage::RecordingStopped {
                    session_id: self.session_id.clone(),
                    started_at,
                })
                .await;
            }

            ClientMessage::Leave {} => {
                info!("{} left room {}", sender.persistent_id, self.session_id);
                self.remove_member(&sender.persistent_id).await;
            }
        }
    }

    async fn check_recording_request(&self, sender: &Participant, session_id: &SessionId) -> bool {
        if sender.role != Role::Host {
            self.send_error(sender.connection_id, "only the host controls recording")
                .await;
            return false;
        }
        if *session_id != self.session_id {
            self.send_error(sender.connection_id, "wrong session").await;
            return false;
        }
        true
    }

    async fn relay(&self, sender: &Participant, target: ConnectionId, message: ServerMessage) {
        let reachable = target != sender.connection_id
            && self
                .members
                .iter()
                .any(|m| m.live && m.participant.connection_id == target);

        if !reachable {
            debug!(
                "Dropping '{}' from {} to unknown target {:?}",
                message.event_name(),
                sender.persistent_id,
                target
            );
            return;
        }

        self.signaling.send(target, message).await;
    }

    async fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.live && m.participant.connection_id == connection_id)
        else {
            return;
        };

        member.live = false;
        member.generation += 1;
        let pid = member.participant.persistent_id.clone();
        let generation = member.generation;

        if self.config.reconnect_grace.is_zero() {
            self.remove_member(&pid).await;
            return;
        }

        info!(
            "{} dropped, holding the slot for {:?}",
            pid, self.config.reconnect_grace
        );
        let grace = self.config.reconnect_grace;
        let timer_tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = timer_tx.send(GraceExpired {
                persistent_id: pid,
                generation,
            });
        });
    }

    async fn handle_grace_expired(&mut self, expired: GraceExpired) {
        let still_gone = self.members.iter().any(|m| {
            m.participant.persistent_id == expired.persistent_id
                && !m.live
                && m.generation == expired.generation
        });

        if still_gone {
            info!("Grace window over for {}", expired.persistent_id);
            self.remove_member(&expired.persistent_id).await;
        }
    }

    async fn remove_member(&mut self, pid: &PersistentId) {
        let Some(idx) = self.position(pid) else {
            return;
        };
        self.members.remove(idx);

        self.broadcast_except(
            pid,
            ServerMessage::PeerLeft {
                persistent_id: pid.clone(),
            },
        )
        .await;
    }

    /// Leave the registry once nobody is in the room and no socket holds a
    /// sender to it. The check runs under the registry's shard lock, so no
    /// sender can be handed out between the check and the removal.
    fn try_retire(&self) -> bool {
        let Some(registry) = &self.registry else {
            return false;
        };
        if !self.members.is_empty() {
            return false;
        }

        registry
            .remove_if(&self.session_id, |_, tx| {
                tx.strong_count() == 1 && self.command_rx.is_empty()
            })
            .is_some()
    }

    fn position(&self, pid: &PersistentId) -> Option<usize> {
        self.members
            .iter()
            .position(|m| &m.participant.persistent_id == pid)
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            session_id: self.session_id.clone(),
            participants: self.members.iter().map(|m| m.participant.clone()).collect(),
            recording_state: self.recording.clone(),
        }
    }

    async fn broadcast(&self, message: ServerMessage) {
        for member in self.members.iter().filter(|m| m.live) {
            self.signaling
                .send(member.participant.connection_id, message.clone())
                .await;
        }
    }

    async fn broadcast_except(&self, pid: &PersistentId, message: ServerMessage) {
        for member in self
            .members
            .iter()
            .filter(|m| m.live && &m.participant.persistent_id != pid)
        {
            self.signaling
                .send(member.participant.connection_id, message.clone())
                .await;
        }
    }

    async fn send_error(&self, connection_id: ConnectionId, message: &str) {
        self.signaling
            .send(
                connection_id,
                ServerMessage::Error {
                    message: message.to_string(),
                },
            )
            .await;
    }
}
