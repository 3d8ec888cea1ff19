use duet_core::{ClientMessage, ConnectionId, JoinRequest, PersistentId};

/// Commands delivered to a room by the WebSocket layer.
#[derive(Debug)]
pub enum RoomCommand {
    /// A socket asked to join this room.
    Join {
        connection_id: ConnectionId,
        request: JoinRequest,
    },

    /// Any other client message from a socket bound to this room.
    Signal {
        connection_id: ConnectionId,
        message: ClientMessage,
    },

    /// The socket went away.
    Disconnect { connection_id: ConnectionId },
}

/// Fired by the room's own reconnect-grace timers.
#[derive(Debug)]
pub(crate) struct GraceExpired {
    pub persistent_id: PersistentId,
    pub generation: u64,
}
