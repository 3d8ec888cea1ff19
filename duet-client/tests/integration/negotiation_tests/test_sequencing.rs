use duet_client::{NegotiationError, NegotiationPhase, NegotiationRole, PeerEventKind};
use duet_core::{IceCandidate, SessionDescription};

use crate::integration::create_test_negotiation;
use crate::utils::{MockPeerConnector, MockSignalingOutput, init_tracing};

#[tokio::test]
async fn test_answer_before_offer_is_rejected() {
    init_tracing();

    let connector = MockPeerConnector::new();
    let (mut session, _events) = create_test_negotiation(&connector, NegotiationRole::Initiator).await;
    let transport = connector.latest_for(&session.peer()).unwrap();

    let err = session
        .receive_answer(SessionDescription::answer("v=0"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::InvalidPhase {
            phase: NegotiationPhase::New,
            ..
        }
    ));
    assert!(!transport.remote_set());
    assert!(!session.remote_description_set());
}

#[tokio::test]
async fn test_roles_are_enforced() {
    init_tracing();

    let connector = MockPeerConnector::new();
    let signaling = MockSignalingOutput::new_stored_only();

    let (mut responder, _r) = create_test_negotiation(&connector, NegotiationRole::Responder).await;
    assert!(responder.send_offer(&signaling).await.is_err());

    let (mut initiator, _i) = create_test_negotiation(&connector, NegotiationRole::Initiator).await;
    assert!(
        initiator
            .receive_offer(SessionDescription::offer("v=0"), &signaling)
            .await
            .is_err()
    );
    assert!(signaling.emitted().is_empty());
}

#[tokio::test]
async fn test_second_offer_is_rejected() {
    init_tracing();

    let connector = MockPeerConnector::new();
    let signaling = MockSignalingOutput::new_stored_only();
    let (mut session, _events) = create_test_negotiation(&connector, NegotiationRole::Responder).await;

    session
        .receive_offer(SessionDescription::offer("v=0"), &signaling)
        .await
        .unwrap();
    let second = session
        .receive_offer(SessionDescription::offer("v=0"), &signaling)
        .await;

    assert!(second.is_err());
    assert_eq!(signaling.answers_to(&session.peer()).len(), 1);
}

#[tokio::test]
async fn test_candidate_for_closed_session_is_refused() {
    init_tracing();

    let connector = MockPeerConnector::new();
    let (mut session, _events) = create_test_negotiation(&connector, NegotiationRole::Responder).await;
    session.close().await;

    let result = session.receive_ice_candidate(IceCandidate::new("c")).await;
    assert!(matches!(result, Err(NegotiationError::Closed)));
    assert_eq!(session.pending_len(), 0);
}

#[tokio::test]
async fn test_hooks_report_connected_after_exchange() {
    init_tracing();

    let connector = MockPeerConnector::new();
    let signaling = MockSignalingOutput::new_stored_only();
    let (mut session, mut events) =
        create_test_negotiation(&connector, NegotiationRole::Initiator).await;

    session.send_offer(&signaling).await.unwrap();
    session
        .receive_answer(SessionDescription::answer("v=0"))
        .await
        .unwrap();

    while let Ok(event) = events.try_recv() {
        assert_eq!(event.negotiation_id, session.id());
        if let PeerEventKind::StateChanged(state) = event.kind {
            session.on_connection_state(state);
        }
    }

    assert_eq!(session.phase(), NegotiationPhase::Connected);
}
