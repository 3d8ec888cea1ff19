use crate::negotiation::{NegotiationPhase, NegotiationRole};
use crate::session::{RejectionReason, SessionObserver};
use duet_core::{ConnectionId, RoomSnapshot};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Joining,
    Joined,
    Rejected(RejectionReason),
}

/// Requests from a [`SessionHandle`](crate::SessionHandle) to its controller.
pub enum SessionCommand {
    Join,
    Leave,
    StartRecording,
    StopRecording,
    SetObserver(Arc<dyn SessionObserver>),
    Status(oneshot::Sender<SessionStatus>),
}

impl fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join => "Join",
            Self::Leave => "Leave",
            Self::StartRecording => "StartRecording",
            Self::StopRecording => "StopRecording",
            Self::SetObserver(_) => "SetObserver",
            Self::Status(_) => "Status",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct NegotiationStatus {
    pub peer: ConnectionId,
    pub role: NegotiationRole,
    pub phase: NegotiationPhase,
    pub pending_candidates: usize,
}

/// Point-in-time view of a controller.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub snapshot: RoomSnapshot,
    pub negotiations: Vec<NegotiationStatus>,
}

impl SessionStatus {
    pub fn negotiation(&self, peer: &ConnectionId) -> Option<&NegotiationStatus> {
        self.negotiations.iter().find(|n| &n.peer == peer)
    }
}
