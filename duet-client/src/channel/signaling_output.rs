use async_trait::async_trait;
use duet_core::{ClientMessage, ConnectionId, IceCandidate, SessionDescription};

/// Outbound half of the rendezvous protocol, as seen by the session controller
/// and the negotiation engine.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn emit(&self, message: ClientMessage);

    /// Stop the transport from reconnecting on its own after the next drop.
    fn disable_auto_reconnect(&self);

    /// Re-enable automatic reconnection and restart the transport if it stopped.
    fn reconnect(&self);

    async fn send_offer(&self, target: ConnectionId, description: SessionDescription) {
        self.emit(ClientMessage::Offer {
            target,
            description,
        })
        .await;
    }

    async fn send_answer(&self, target: ConnectionId, description: SessionDescription) {
        self.emit(ClientMessage::Answer {
            target,
            description,
        })
        .await;
    }

    async fn send_ice(&self, target: ConnectionId, candidate: IceCandidate) {
        self.emit(ClientMessage::IceCandidate { target, candidate })
            .await;
    }
}
