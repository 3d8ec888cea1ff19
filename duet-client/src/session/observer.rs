use crate::media::RemoteStream;
use crate::negotiation::PeerConnectionState;
use duet_core::{ConnectionId, RoomSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    RoomFull,
    DuplicateSession,
}

/// Callbacks the session controller exposes to the presentation layer.
///
/// Called from the controller task; implementations must not block.
pub trait SessionObserver: Send + Sync {
    fn on_remote_stream(&self, _peer: ConnectionId, _stream: RemoteStream) {}

    fn on_connection_state_change(&self, _peer: ConnectionId, _state: PeerConnectionState) {}

    fn on_room_snapshot_changed(&self, _snapshot: &RoomSnapshot) {}

    /// The join attempt was refused. Automatic reconnection is already off.
    fn on_rejected(&self, _reason: RejectionReason) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
