use crate::model::peer::{ConnectionId, Participant, PersistentId, Role};
use crate::model::room::{RoomSnapshot, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Trickle ICE candidate in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub session_id: SessionId,
    pub role: Role,
    pub persistent_id: PersistentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Client → coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Join(JoinRequest),
    Offer {
        target: ConnectionId,
        description: SessionDescription,
    },
    Answer {
        target: ConnectionId,
        description: SessionDescription,
    },
    IceCandidate {
        target: ConnectionId,
        candidate: IceCandidate,
    },
    StartRecording {
        session_id: SessionId,
    },
    StopRecording {
        session_id: SessionId,
    },
    Leave {},
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::StartRecording { .. } => "start-recording",
            Self::StopRecording { .. } => "stop-recording",
            Self::Leave {} => "leave",
        }
    }
}

/// Coordinator → client. Relayed negotiation messages carry the sender in `from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    FullState(RoomSnapshot),
    PeerJoined(Participant),
    PeerLeft {
        persistent_id: PersistentId,
    },
    PeerReconnected {
        persistent_id: PersistentId,
        new_connection_id: ConnectionId,
    },
    RoomFull {},
    DuplicateSession {},
    Offer {
        from: ConnectionId,
        description: SessionDescription,
    },
    Answer {
        from: ConnectionId,
        description: SessionDescription,
    },
    IceCandidate {
        from: ConnectionId,
        candidate: IceCandidate,
    },
    RecordingStarted {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at: Option<i64>,
    },
    RecordingStopped {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at: Option<i64>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn event_name(&self) -> EventName {
        match self {
            Self::FullState(_) => EventName::FullState,
            Self::PeerJoined(_) => EventName::PeerJoined,
            Self::PeerLeft { .. } => EventName::PeerLeft,
            Self::PeerReconnected { .. } => EventName::PeerReconnected,
            Self::RoomFull {} => EventName::RoomFull,
            Self::DuplicateSession {} => EventName::DuplicateSession,
            Self::Offer { .. } => EventName::Offer,
            Self::Answer { .. } => EventName::Answer,
            Self::IceCandidate { .. } => EventName::IceCandidate,
            Self::RecordingStarted { .. } => EventName::RecordingStarted,
            Self::RecordingStopped { .. } => EventName::RecordingStopped,
            Self::Error { .. } => EventName::Error,
        }
    }
}

/// Names a handler can subscribe to on the rendezvous channel: every coordinator
/// event plus the channel's own `connect` / `disconnect` lifecycle.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum EventName {
    Connect,
    Disconnect,
    FullState,
    PeerJoined,
    PeerLeft,
    PeerReconnected,
    RoomFull,
    DuplicateSession,
    Offer,
    Answer,
    IceCandidate,
    RecordingStarted,
    RecordingStopped,
    Error,
}

impl EventName {
    pub const ALL: [EventName; 14] = [
        Self::Connect,
        Self::Disconnect,
        Self::FullState,
        Self::PeerJoined,
        Self::PeerLeft,
        Self::PeerReconnected,
        Self::RoomFull,
        Self::DuplicateSession,
        Self::Offer,
        Self::Answer,
        Self::IceCandidate,
        Self::RecordingStarted,
        Self::RecordingStopped,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::FullState => "full-state",
            Self::PeerJoined => "peer-joined",
            Self::PeerLeft => "peer-left",
            Self::PeerReconnected => "peer-reconnected",
            Self::RoomFull => "room-full",
            Self::DuplicateSession => "duplicate-session",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::RecordingStarted => "recording-started",
            Self::RecordingStopped => "recording-stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
