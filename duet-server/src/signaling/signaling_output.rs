use async_trait::async_trait;
use duet_core::{ConnectionId, ServerMessage};

/// What a room needs from the socket layer: deliver a message to one connection
/// and hang it up.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send(&self, connection_id: ConnectionId, message: ServerMessage);

    /// Close the socket after everything already sent to it has been flushed.
    async fn close(&self, connection_id: ConnectionId);

    /// Whether the socket is still attached.
    fn is_connected(&self, connection_id: &ConnectionId) -> bool;
}
