use duet_client::{ChannelEvent, SessionPhase};
use duet_core::{ClientMessage, Role};

use crate::utils::{TestSession, WAIT_TIMEOUT_MS, init_tracing, participant, wait_for};

#[tokio::test]
async fn test_repeated_join_emits_once() {
    init_tracing();

    let session = TestSession::start("alice", Role::Host).await;
    for _ in 0..5 {
        session.handle.join().await.unwrap();
    }

    assert!(wait_for(WAIT_TIMEOUT_MS, || session.signaling.join_count() == 1).await);
    assert!(session.wait_for_status(|s| s.phase == SessionPhase::Joining).await);

    // Everything queued ahead of the status reply has been processed by now.
    session.handle.join().await.unwrap();
    session.status().await;
    assert_eq!(session.signaling.join_count(), 1);

    match &session.signaling.emitted()[0] {
        ClientMessage::Join(request) => {
            assert_eq!(request.persistent_id, session.me.persistent_id);
            assert_eq!(request.role, Role::Host);
        }
        other => panic!("expected join, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_while_joined_is_a_no_op() {
    init_tracing();

    let session = TestSession::start("alice", Role::Host).await;
    session.join_room(&[]).await;

    session.handle.join().await.unwrap();
    session.handle.join().await.unwrap();
    session.status().await;

    assert_eq!(session.signaling.join_count(), 1);
}

#[tokio::test]
async fn test_join_is_replayed_once_per_new_transport() {
    init_tracing();

    let session = TestSession::start("alice", Role::Host).await;
    let bob = participant("bob", Role::Guest);
    session.join_room(&[bob.clone()]).await;
    assert_eq!(session.status().await.negotiations.len(), 1);

    session.channel_tx.send(ChannelEvent::Disconnected).unwrap();
    assert!(
        session
            .wait_for_status(|s| s.phase == SessionPhase::Disconnected
                && s.negotiations.is_empty()
                && s.snapshot.participants.is_empty())
            .await
    );
    assert!(session.connector.latest_for(&bob.connection_id).unwrap().is_closed());

    session.channel_tx.send(ChannelEvent::Connected).unwrap();
    session.channel_tx.send(ChannelEvent::Connected).unwrap();

    assert!(wait_for(WAIT_TIMEOUT_MS, || session.signaling.join_count() == 2).await);
    session.status().await;
    assert_eq!(session.signaling.join_count(), 2);
}

#[tokio::test]
async fn test_leave_emits_leave_and_allows_rejoin() {
    init_tracing();

    let session = TestSession::start("alice", Role::Host).await;
    session.join_room(&[]).await;

    session.handle.leave().await.unwrap();
    assert!(session.wait_for_status(|s| s.phase == SessionPhase::Disconnected).await);
    assert!(
        session
            .signaling
            .emitted()
            .contains(&ClientMessage::Leave {})
    );

    session.handle.join().await.unwrap();
    assert!(wait_for(WAIT_TIMEOUT_MS, || session.signaling.join_count() == 2).await);
}
