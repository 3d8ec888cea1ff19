use duet_core::{PersistentId, RecordingStatus, Role, ServerMessage};

use crate::utils::{TestRoom, init_tracing};

#[tokio::test]
async fn test_first_join_gets_snapshot_with_itself() {
    init_tracing();

    let mut room = TestRoom::start();
    let alice = room.join("alice", Role::Host).await;

    let ServerMessage::FullState(snapshot) = room.expect_message(alice).await else {
        panic!("expected full-state");
    };
    assert_eq!(snapshot.participants.len(), 1);
    assert_eq!(snapshot.participants[0].connection_id, alice);
    assert_eq!(snapshot.participants[0].role, Role::Host);
    assert_eq!(snapshot.recording_state.status, RecordingStatus::Idle);
}

#[tokio::test]
async fn test_second_join_announced_to_first() {
    init_tracing();

    let mut room = TestRoom::start();
    let alice = room.join("alice", Role::Host).await;
    room.expect_message(alice).await;

    let bob = room.join("bob", Role::Guest).await;

    let ServerMessage::FullState(snapshot) = room.expect_message(bob).await else {
        panic!("expected full-state");
    };
    let pids: Vec<_> = snapshot
        .participants
        .iter()
        .map(|p| p.persistent_id.0.as_str())
        .collect();
    assert_eq!(pids, vec!["alice", "bob"]);

    match room.expect_message(alice).await {
        ServerMessage::PeerJoined(participant) => {
            assert_eq!(participant.persistent_id, PersistentId::from("bob"));
            assert_eq!(participant.connection_id, bob);
        }
        other => panic!("expected peer-joined, got {other:?}"),
    }
    room.expect_silence(bob).await;
}

#[tokio::test]
async fn test_rejoin_on_same_socket_resends_snapshot() {
    init_tracing();

    let mut room = TestRoom::start();
    let alice = room.join("alice", Role::Host).await;
    room.expect_message(alice).await;

    room.join_on(alice, "alice", Role::Host).await;

    assert!(matches!(
        room.expect_message(alice).await,
        ServerMessage::FullState(_)
    ));
    assert!(!room.signaling.was_closed(&alice).await);
}
