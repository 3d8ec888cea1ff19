use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use duet_core::{ConnectionId, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

struct SignalingInner {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
}

/// Outgoing half of every open socket, keyed by connection id.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
            }),
        }
    }

    pub fn add_connection(&self, connection_id: ConnectionId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.connections.insert(connection_id, tx);
    }

    pub fn remove_connection(&self, connection_id: &ConnectionId) {
        self.inner.connections.remove(connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn send_signal(&self, connection_id: ConnectionId, msg: &ServerMessage) {
        let Some(connection) = self.inner.connections.get(&connection_id) else {
            warn!(
                "Attempted to send '{}' to closed connection {:?}",
                msg.event_name(),
                connection_id
            );
            return;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = connection.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {:?}: {:?}", connection_id, e);
                }
            }
            Err(e) => error!("Failed to serialize server message: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send(&self, connection_id: ConnectionId, message: ServerMessage) {
        self.send_signal(connection_id, &message);
    }

    async fn close(&self, connection_id: ConnectionId) {
        let Some((_, connection)) = self.inner.connections.remove(&connection_id) else {
            return;
        };
        debug!("Closing connection {:?}", connection_id);
        let _ = connection.send(Message::Close(None));
    }

    fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.inner.connections.contains_key(connection_id)
    }
}
