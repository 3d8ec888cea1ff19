use duet_client::{ChannelEvent, RejectionReason, SessionPhase};
use duet_core::{ClientMessage, Role, ServerMessage};

use crate::utils::{
    Recorded, TestSession, WAIT_TIMEOUT_MS, full_state, init_tracing, participant, wait_for,
};

#[tokio::test]
async fn test_room_full_disables_reconnect_before_surfacing() {
    init_tracing();

    let session = TestSession::start("carol", Role::Guest).await;
    session.handle.join().await.unwrap();
    assert!(wait_for(WAIT_TIMEOUT_MS, || session.signaling.join_count() == 1).await);

    session.deliver(ServerMessage::RoomFull {});

    assert!(
        session
            .wait_for_status(|s| s.phase == SessionPhase::Rejected(RejectionReason::RoomFull))
            .await
    );
    assert!(session.signaling.auto_reconnect_disabled());
    assert_eq!(session.observer.rejections(), vec![RejectionReason::RoomFull]);
    assert_eq!(session.observer.reconnect_off_at_rejection(), vec![true]);

    // The coordinator closes the transport; nothing may rejoin on its own.
    session.channel_tx.send(ChannelEvent::Disconnected).unwrap();
    session.channel_tx.send(ChannelEvent::Connected).unwrap();

    let status = session.status().await;
    assert_eq!(status.phase, SessionPhase::Rejected(RejectionReason::RoomFull));
    assert_eq!(session.signaling.join_count(), 1);
    assert!(!session.signaling.log().contains(&Recorded::Reconnected));
}

#[tokio::test]
async fn test_explicit_join_after_room_full_retries() {
    init_tracing();

    let alice = participant("alice", Role::Host);
    let session = TestSession::start("carol", Role::Guest).await;
    session.handle.join().await.unwrap();
    assert!(wait_for(WAIT_TIMEOUT_MS, || session.signaling.join_count() == 1).await);

    session.deliver(ServerMessage::RoomFull {});
    assert!(
        session
            .wait_for_status(|s| s.phase == SessionPhase::Rejected(RejectionReason::RoomFull))
            .await
    );
    session.channel_tx.send(ChannelEvent::Disconnected).unwrap();

    // The user asks again once the slot may have freed up.
    session.handle.join().await.unwrap();

    assert!(wait_for(WAIT_TIMEOUT_MS, || session.signaling.join_count() == 2).await);
    assert!(!session.signaling.auto_reconnect_disabled());
    let log = session.signaling.log();
    let restarted_at = log.iter().position(|r| r == &Recorded::Reconnected).unwrap();
    let rejoin_at = log
        .iter()
        .rposition(|r| matches!(r, Recorded::Emitted(ClientMessage::Join(_))))
        .unwrap();
    assert!(restarted_at < rejoin_at);
    assert_eq!(session.status().await.phase, SessionPhase::Joining);

    // Transport comes back: the pending join is not duplicated.
    session.channel_tx.send(ChannelEvent::Connected).unwrap();
    session.deliver(full_state(vec![alice.clone(), session.me.clone()]));

    assert!(
        session
            .wait_for_status(|s| s.phase == SessionPhase::Joined && s.negotiations.len() == 1)
            .await
    );
    assert_eq!(session.signaling.join_count(), 2);
}

#[tokio::test]
async fn test_duplicate_session_tears_down_negotiations() {
    init_tracing();

    let bob = participant("bob", Role::Host);
    let session = TestSession::start("alice", Role::Guest).await;
    session.join_room(&[bob.clone()]).await;
    assert_eq!(session.status().await.negotiations.len(), 1);

    session.deliver(ServerMessage::DuplicateSession {});

    assert!(
        session
            .wait_for_status(|s| s.phase
                == SessionPhase::Rejected(RejectionReason::DuplicateSession)
                && s.negotiations.is_empty())
            .await
    );
    assert!(session.signaling.auto_reconnect_disabled());
    assert!(session.connector.latest_for(&bob.connection_id).unwrap().is_closed());
    assert_eq!(
        session.observer.rejections(),
        vec![RejectionReason::DuplicateSession]
    );
}
