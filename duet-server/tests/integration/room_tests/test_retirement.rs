use duet_core::{ClientMessage, ConnectionId, JoinRequest, PersistentId, Role, SessionId};
use duet_server::{CoordinatorConfig, RoomCommand, RoomManager};
use std::sync::Arc;
use std::time::Duration;

use crate::utils::{MockSignalingOutput, init_tracing};

const SWEEP: Duration = Duration::from_secs(1);

fn manager(signaling: &MockSignalingOutput, grace: Duration) -> RoomManager {
    RoomManager::new(
        Arc::new(signaling.clone()),
        CoordinatorConfig {
            reconnect_grace: grace,
            idle_room_sweep: SWEEP,
            ..CoordinatorConfig::default()
        },
    )
}

fn join(connection_id: ConnectionId, session: &str, pid: &str) -> RoomCommand {
    RoomCommand::Join {
        connection_id,
        request: JoinRequest {
            session_id: SessionId::from(session),
            role: Role::Host,
            persistent_id: PersistentId::from(pid),
            email: None,
        },
    }
}

#[tokio::test(start_paused = true)]
async fn test_room_is_dropped_after_last_member_leaves() {
    init_tracing();

    let signaling = MockSignalingOutput::new_stored_only();
    let rooms = manager(&signaling, Duration::from_secs(10));
    let alice = ConnectionId::new();
    signaling.open(alice);

    let room = rooms.get_room_sender(&SessionId::from("short-call"));
    room.send(join(alice, "short-call", "alice")).await.unwrap();
    room.send(RoomCommand::Signal {
        connection_id: alice,
        message: ClientMessage::Leave {},
    })
    .await
    .unwrap();
    drop(room);

    tokio::time::sleep(SWEEP * 3).await;
    assert_eq!(rooms.room_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_room_waits_for_grace_window() {
    init_tracing();

    let signaling = MockSignalingOutput::new_stored_only();
    let rooms = manager(&signaling, Duration::from_secs(5));
    let alice = ConnectionId::new();
    signaling.open(alice);

    let room = rooms.get_room_sender(&SessionId::from("dropped-call"));
    room.send(join(alice, "dropped-call", "alice")).await.unwrap();
    signaling.drop_socket(&alice);
    room.send(RoomCommand::Disconnect { connection_id: alice })
        .await
        .unwrap();
    drop(room);

    // The slot is still held for a reconnect.
    tokio::time::sleep(SWEEP * 3).await;
    assert_eq!(rooms.room_count(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(rooms.room_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_id_is_reusable_after_retirement() {
    init_tracing();

    let signaling = MockSignalingOutput::new_stored_only();
    let rooms = manager(&signaling, Duration::ZERO);
    let session = SessionId::from("weekly-show");

    let first = rooms.get_room_sender(&session);
    drop(first);
    tokio::time::sleep(SWEEP * 2).await;
    assert_eq!(rooms.room_count(), 0);

    let bob = ConnectionId::new();
    signaling.open(bob);
    let second = rooms.get_room_sender(&session);
    second.send(join(bob, "weekly-show", "bob")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let messages = signaling.messages_to(&bob).await;
    assert!(matches!(
        messages.first(),
        Some(duet_core::ServerMessage::FullState(snapshot)) if snapshot.participants.len() == 1
    ));
    assert_eq!(rooms.room_count(), 1);
}
