use async_trait::async_trait;
use duet_core::{ConnectionId, ServerMessage};
use duet_server::SignalingOutput;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message {
        to: ConnectionId,
        message: ServerMessage,
    },
    Closed(ConnectionId),
}

/// Mock SignalingOutput that captures everything a room sends.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<Sent>,
    sent: Arc<Mutex<Vec<Sent>>>,
    /// Sockets the room should consider attached.
    open: Arc<std::sync::Mutex<HashSet<ConnectionId>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Sent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(std::sync::Mutex::new(HashSet::new())),
        };
        (signaling, rx)
    }

    /// Create a MockSignalingOutput without a receiver (sends are only stored).
    pub fn new_stored_only() -> Self {
        let (signaling, _rx) = Self::new();
        signaling
    }

    pub fn open(&self, connection_id: ConnectionId) {
        self.open.lock().unwrap().insert(connection_id);
    }

    /// Simulate the socket going away before the room hears about it.
    pub fn drop_socket(&self, connection_id: &ConnectionId) {
        self.open.lock().unwrap().remove(connection_id);
    }

    pub async fn messages_to(&self, connection_id: &ConnectionId) -> Vec<ServerMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Message { to, message } if to == connection_id => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn was_closed(&self, connection_id: &ConnectionId) -> bool {
        self.sent
            .lock()
            .await
            .iter()
            .any(|s| s == &Sent::Closed(*connection_id))
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send(&self, connection_id: ConnectionId, message: ServerMessage) {
        tracing::debug!(
            "[MockSignaling] '{}' to {:?}",
            message.event_name(),
            connection_id
        );

        let sent = Sent::Message {
            to: connection_id,
            message,
        };
        self.sent.lock().await.push(sent.clone());
        let _ = self.tx.send(sent);
    }

    async fn close(&self, connection_id: ConnectionId) {
        tracing::debug!("[MockSignaling] close {:?}", connection_id);

        self.open.lock().unwrap().remove(&connection_id);
        self.sent.lock().await.push(Sent::Closed(connection_id));
        let _ = self.tx.send(Sent::Closed(connection_id));
    }

    fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.open.lock().unwrap().contains(connection_id)
    }
}
