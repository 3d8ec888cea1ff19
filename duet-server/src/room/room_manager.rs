use crate::config::CoordinatorConfig;
use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use duet_core::SessionId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub(crate) type RoomRegistry = Arc<DashMap<SessionId, mpsc::Sender<RoomCommand>>>;

/// One room actor per session id, spawned on first use. A room removes its
/// own entry once it has been idle for a sweep period.
#[derive(Clone)]
pub struct RoomManager {
    rooms: RoomRegistry,
    signaling: Arc<dyn SignalingOutput>,
    config: CoordinatorConfig,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>, config: CoordinatorConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
            config,
        }
    }

    pub fn get_room_sender(&self, session_id: &SessionId) -> mpsc::Sender<RoomCommand> {
        if let Some(sender) = self.rooms.get(session_id) {
            return sender.clone();
        }

        self.rooms
            .entry(session_id.clone())
            .or_insert_with(|| {
                info!("Creating new room: {}", session_id);
                let (tx, rx) = mpsc::channel(100);
                let room = Room::new(
                    session_id.clone(),
                    rx,
                    self.signaling.clone(),
                    self.config.clone(),
                )
                .registered_in(self.rooms.clone());
                tokio::spawn(room.run());
                tx
            })
            .clone()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
