//! Presence and Connection Registry Tests

use pretty_assertions::assert_eq;
use serde_json::json;

use dm_gateway::presentation::websocket::CloseReason;

use crate::common::*;

fn status(user: dm_gateway::domain::Snowflake, online: bool) -> serde_json::Value {
    json!({ "type": "status", "userId": user.to_string(), "online": online })
}

#[tokio::test]
async fn test_connect_announces_online_to_participants_only() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;
    let mut carol = gateway.connect(CAROL).await;

    let _bob = gateway.connect(BOB).await;

    assert_eq!(alice.next_frame().await, status(BOB, true));
    carol.assert_silent().await;
}

#[tokio::test]
async fn test_disconnect_announces_offline() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;
    let bob = gateway.connect(BOB).await;
    assert_eq!(alice.next_frame().await, status(BOB, true));

    let notified = gateway
        .registry
        .disconnect(&bob.session, CloseReason::ClientClosed)
        .await;

    assert_eq!(notified, 1);
    assert!(!gateway.registry.is_online(BOB));
    assert_eq!(alice.next_frame().await, status(BOB, false));
}

#[tokio::test]
async fn test_reconnect_evicts_previous_session_quietly() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;
    let mut first = gateway.connect(BOB).await;
    assert_eq!(alice.next_frame().await, status(BOB, true));

    let second = gateway.connect(BOB).await;

    assert!(first.was_closed().await);
    assert_eq!(first.session.close_reason(), Some(CloseReason::Evicted));
    assert_eq!(gateway.registry.len(), 2);
    assert_eq!(alice.next_frame().await, status(BOB, true));

    // The evicted session's own teardown must not mark Bob offline
    let notified = gateway
        .registry
        .disconnect(&first.session, CloseReason::ClientClosed)
        .await;
    assert_eq!(notified, 0);
    assert!(gateway.registry.is_online(BOB));
    assert!(std::sync::Arc::ptr_eq(
        &gateway.registry.lookup(BOB).unwrap(),
        &second.session
    ));
    alice.assert_silent().await;
}

#[tokio::test]
async fn test_second_disconnect_is_a_no_op() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;
    let bob = gateway.connect(BOB).await;
    assert_eq!(alice.next_frame().await, status(BOB, true));

    gateway
        .registry
        .disconnect(&bob.session, CloseReason::Timeout)
        .await;
    let again = gateway
        .registry
        .disconnect(&bob.session, CloseReason::ClientClosed)
        .await;

    assert_eq!(again, 0);
    assert_eq!(bob.session.close_reason(), Some(CloseReason::Timeout));
    assert_eq!(alice.next_frame().await, status(BOB, false));
    alice.assert_silent().await;
}

#[tokio::test]
async fn test_linked_users_see_each_others_presence() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;
    let carol = gateway.connect(CAROL).await;
    alice.assert_silent().await;

    gateway.registry.link(ALICE, CAROL);
    gateway
        .registry
        .disconnect(&carol.session, CloseReason::ClientClosed)
        .await;

    assert_eq!(alice.next_frame().await, status(CAROL, false));
}

#[tokio::test]
async fn test_filter_online_keeps_request_order() {
    let gateway = TestGateway::new();
    let _alice = gateway.connect(ALICE).await;
    let _carol = gateway.connect(CAROL).await;

    let online = gateway.registry.filter_online(&[CAROL, BOB, ALICE]);

    assert_eq!(online, vec![CAROL, ALICE]);
}

#[tokio::test]
async fn test_shutdown_closes_everyone_without_presence() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;
    let mut bob = gateway.connect(BOB).await;
    assert_eq!(alice.next_frame().await, status(BOB, true));

    gateway.registry.shutdown().await;

    assert!(gateway.registry.is_empty());
    assert!(alice.was_closed().await);
    assert!(bob.was_closed().await);
    assert_eq!(alice.session.close_reason(), Some(CloseReason::Shutdown));
}
