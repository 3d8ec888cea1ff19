use duet_client::{
    ChannelEvent, IceConfig, SessionConfig, SessionController, SessionHandle, SessionPhase,
    SessionStatus,
};
use duet_core::{
    ConnectionId, Participant, PersistentId, RecordingState, Role, RoomSnapshot, ServerMessage,
    SessionId,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::Level;

use super::mock_peer::MockPeerConnector;
use super::mock_signaling::MockSignalingOutput;
use super::recording_observer::RecordingObserver;

pub const TEST_SESSION: &str = "session-under-test";

/// Timeout for anything the controller does asynchronously (ms).
pub const WAIT_TIMEOUT_MS: u64 = 5000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or the timeout expires.
pub async fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn participant(pid: &str, role: Role) -> Participant {
    Participant {
        connection_id: ConnectionId::new(),
        persistent_id: PersistentId::from(pid),
        role,
        email: None,
    }
}

pub fn full_state(participants: Vec<Participant>) -> ServerMessage {
    ServerMessage::FullState(RoomSnapshot {
        session_id: SessionId::from(TEST_SESSION),
        participants,
        recording_state: RecordingState::idle(SessionId::from(TEST_SESSION)),
    })
}

/// A controller wired to mocks, with the channel side driven by the test.
pub struct TestSession {
    pub me: Participant,
    pub handle: SessionHandle,
    pub channel_tx: mpsc::UnboundedSender<ChannelEvent>,
    pub signaling: MockSignalingOutput,
    pub connector: MockPeerConnector,
    pub observer: RecordingObserver,
}

impl TestSession {
    pub async fn start(pid: &str, role: Role) -> Self {
        Self::start_with(pid, role, MockPeerConnector::new()).await
    }

    pub async fn start_with(pid: &str, role: Role, connector: MockPeerConnector) -> Self {
        let me = participant(pid, role);
        let config = SessionConfig {
            session_id: SessionId::from(TEST_SESSION),
            persistent_id: me.persistent_id.clone(),
            role,
            email: None,
            ice: IceConfig::local_only(),
        };

        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        let signaling = MockSignalingOutput::new_stored_only();
        let (controller, handle) = SessionController::new(
            config,
            Arc::new(signaling.clone()),
            Arc::new(connector.clone()),
            Vec::new(),
            channel_rx,
        );
        tokio::spawn(controller.run());

        let watched = signaling.clone();
        let observer = RecordingObserver::watching_reconnect(move || watched.auto_reconnect_disabled());
        handle
            .set_observer(Arc::new(observer.clone()))
            .await
            .expect("controller running");
        channel_tx
            .send(ChannelEvent::Connected)
            .expect("controller running");

        Self {
            me,
            handle,
            channel_tx,
            signaling,
            connector,
            observer,
        }
    }

    pub fn deliver(&self, message: ServerMessage) {
        self.channel_tx
            .send(ChannelEvent::Message(message))
            .expect("controller running");
    }

    pub async fn status(&self) -> SessionStatus {
        self.handle.status().await.expect("controller running")
    }

    /// Poll the controller's status until `predicate` holds.
    pub async fn wait_for_status<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&SessionStatus) -> bool,
    {
        let deadline = Instant::now() + Duration::from_millis(WAIT_TIMEOUT_MS);
        loop {
            if predicate(&self.status().await) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Join and receive a full-state listing us plus `others`.
    pub async fn join_room(&self, others: &[Participant]) {
        let joins_before = self.signaling.join_count();
        self.handle.join().await.expect("controller running");
        assert!(
            wait_for(WAIT_TIMEOUT_MS, || self.signaling.join_count() > joins_before).await,
            "join was never emitted"
        );

        let mut participants = others.to_vec();
        participants.push(self.me.clone());
        self.deliver(full_state(participants));

        assert!(
            self.wait_for_status(|s| s.phase == SessionPhase::Joined).await,
            "session never reached Joined"
        );
    }
}
