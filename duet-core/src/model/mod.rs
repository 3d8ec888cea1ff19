mod peer;
mod room;
mod signaling;

pub use peer::{ConnectionId, Participant, PersistentId, Role};
pub use room::{RecordingState, RecordingStatus, RoomSnapshot, SessionId};
pub use signaling::{
    ClientMessage, EventName, IceCandidate, IceServerConfig, JoinRequest, SdpKind,
    ServerMessage, SessionDescription,
};
