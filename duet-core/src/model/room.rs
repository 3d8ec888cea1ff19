use crate::model::peer::{ConnectionId, Participant, PersistentId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
pub struct SessionId(pub String);

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    #[default]
    Idle,
    Recording,
}

/// Coordinator-owned recording state. Clients only observe it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingState {
    pub session_id: SessionId,
    pub status: RecordingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
}

impl RecordingState {
    pub fn idle(session_id: SessionId) -> Self {
        Self {
            session_id,
            status: RecordingStatus::Idle,
            started_at: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub session_id: SessionId,
    pub participants: Vec<Participant>,
    pub recording_state: RecordingState,
}

impl RoomSnapshot {
    pub fn empty(session_id: SessionId) -> Self {
        Self {
            recording_state: RecordingState::idle(session_id.clone()),
            session_id,
            participants: Vec::new(),
        }
    }

    pub fn participant(&self, persistent_id: &PersistentId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| &p.persistent_id == persistent_id)
    }

    pub fn by_connection(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| &p.connection_id == connection_id)
    }

    /// Everyone except the given identity.
    pub fn others<'a>(
        &'a self,
        me: &'a PersistentId,
    ) -> impl Iterator<Item = &'a Participant> + 'a {
        self.participants
            .iter()
            .filter(move |p| &p.persistent_id != me)
    }
}
