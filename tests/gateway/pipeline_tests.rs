//! Message Pipeline Tests

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::*;

const REQUEST_ID: &str = "11111111-1111-1111-1111-111111111111";

/// Connect Alice then Bob and drain the online notice Alice gets for Bob.
async fn pair(gateway: &TestGateway) -> (TestClient, TestClient) {
    let mut alice = gateway.connect(ALICE).await;
    let bob = gateway.connect(BOB).await;
    let status = alice.next_frame().await;
    assert_eq!(status["type"], "status");
    (alice, bob)
}

#[tokio::test]
async fn test_message_is_acknowledged_and_delivered() {
    let gateway = TestGateway::new();
    let (mut alice, mut bob) = pair(&gateway).await;

    gateway
        .send(
            &alice,
            message_frame(REQUEST_ID, TestGateway::CONVERSATION, "  hello bob  "),
        )
        .await;

    let ack = alice.next_frame().await;
    assert_eq!(ack["type"], "acknowledged");
    assert_eq!(ack["id"], REQUEST_ID);
    assert_eq!(ack["message"]["text"], "hello bob");
    assert_eq!(ack["message"]["sender"], ALICE.to_string());

    let delivered = bob.next_frame().await;
    assert_eq!(delivered["type"], "msg");
    assert_eq!(delivered["message"], ack["message"]);

    let stored = gateway.store.messages();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].conversation_id, TestGateway::CONVERSATION);

    let message_id = stored[0].id;
    wait_until(|| gateway.store.last_message_of(TestGateway::CONVERSATION) == Some(message_id))
        .await;
}

#[tokio::test]
async fn test_offline_receiver_still_persists() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;

    gateway
        .send(
            &alice,
            message_frame(REQUEST_ID, TestGateway::CONVERSATION, "are you there"),
        )
        .await;

    assert_eq!(alice.next_frame().await["type"], "acknowledged");
    assert_eq!(gateway.store.messages().len(), 1);
}

#[tokio::test]
async fn test_invalid_frame_gets_error_and_nothing_is_stored() {
    let gateway = TestGateway::new();
    let (mut alice, mut bob) = pair(&gateway).await;

    gateway
        .send(
            &alice,
            message_frame(REQUEST_ID, TestGateway::CONVERSATION, "   "),
        )
        .await;

    let err = alice.next_frame().await;
    assert_eq!(
        err,
        json!({ "type": "err", "message": "Message cannot be empty.", "id": REQUEST_ID })
    );
    assert!(gateway.store.messages().is_empty());
    bob.assert_silent().await;
    assert!(!alice.session.is_closed());
}

#[tokio::test]
async fn test_bad_request_id_is_rejected_without_echo() {
    let gateway = TestGateway::new();
    let mut alice = gateway.connect(ALICE).await;

    gateway
        .send(&alice, json!({ "type": "msg", "conversationId": "500", "message": "hi" }))
        .await;

    let err = alice.next_frame().await;
    assert_eq!(
        err,
        json!({ "type": "err", "message": "Invalid request ID. Must be a valid UUID." })
    );
}

#[tokio::test]
async fn test_outsider_cannot_post_into_conversation() {
    let gateway = TestGateway::new();
    let mut carol = gateway.connect(CAROL).await;

    gateway
        .send(
            &carol,
            message_frame(REQUEST_ID, TestGateway::CONVERSATION, "let me in"),
        )
        .await;

    let err = carol.next_frame().await;
    assert_eq!(err["type"], "err");
    assert_eq!(err["message"], "Couldn't send message.");
    assert_eq!(err["id"], REQUEST_ID);
    assert!(gateway.store.messages().is_empty());
}

#[tokio::test]
async fn test_unclaimed_image_is_rejected_and_claim_survives() {
    let gateway = TestGateway::new();
    let (mut alice, mut bob) = pair(&gateway).await;
    let path = gateway
        .attachments
        .upload(ALICE, "cat.png", vec![1, 2, 3])
        .await
        .unwrap();

    let mut frame = message_frame(REQUEST_ID, TestGateway::CONVERSATION, "look");
    frame["image"] = json!("chat-images/someone-else.png");
    gateway.send(&alice, frame).await;

    let err = alice.next_frame().await;
    assert_eq!(err["message"], "Couldn't send image.");
    assert_eq!(gateway.claims.data_of(ALICE), Some(path.clone()));
    assert!(gateway.store.messages().is_empty());
    bob.assert_silent().await;

    let mut frame = message_frame(REQUEST_ID, TestGateway::CONVERSATION, "look");
    frame["image"] = json!(path);
    gateway.send(&alice, frame).await;

    let ack = alice.next_frame().await;
    assert_eq!(ack["type"], "acknowledged");
    assert_eq!(ack["message"]["image"], json!(path));
    assert_eq!(bob.next_frame().await["message"]["image"], json!(path));

    wait_until(|| gateway.claims.data_of(ALICE).is_none()).await;
    assert!(gateway.blobs.contains(&path));
}

#[tokio::test]
async fn test_someone_elses_claim_cannot_be_used() {
    let gateway = TestGateway::new();
    let (mut alice, _bob) = pair(&gateway).await;
    let bobs = gateway
        .attachments
        .upload(BOB, "dog.png", vec![9])
        .await
        .unwrap();

    let mut frame = message_frame(REQUEST_ID, TestGateway::CONVERSATION, "mine now");
    frame["image"] = json!(bobs);
    gateway.send(&alice, frame).await;

    assert_eq!(alice.next_frame().await["message"], "Couldn't send image.");
    assert_eq!(gateway.claims.data_of(BOB), Some(bobs));
}

#[tokio::test]
async fn test_sender_is_throttled_past_burst() {
    let gateway = TestGateway::with_limits(0.001, 2);
    let (mut alice, mut bob) = pair(&gateway).await;

    for n in 0..3 {
        gateway
            .send(
                &alice,
                message_frame(REQUEST_ID, TestGateway::CONVERSATION, &format!("spam {n}")),
            )
            .await;
    }

    assert_eq!(alice.next_frame().await["type"], "acknowledged");
    assert_eq!(alice.next_frame().await["type"], "acknowledged");
    assert_eq!(
        alice.next_frame().await,
        json!({ "type": "err", "message": "Too fast." })
    );

    assert_eq!(bob.next_frame().await["message"]["text"], "spam 0");
    assert_eq!(bob.next_frame().await["message"]["text"], "spam 1");
    bob.assert_silent().await;
    assert_eq!(gateway.store.messages().len(), 2);
}

#[tokio::test]
async fn test_malformed_json_is_fatal() {
    let gateway = TestGateway::new();
    let alice = gateway.connect(ALICE).await;

    let result = gateway
        .pipeline
        .handle_text(&alice.session, "192.0.2.1", "{\"id\":")
        .await;

    assert!(result.is_err());
}
