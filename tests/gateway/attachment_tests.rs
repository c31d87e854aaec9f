//! Attachment Claim Lifecycle Tests

use pretty_assertions::assert_eq;

use dm_gateway::application::services::AttachmentError;

use crate::common::*;

#[tokio::test]
async fn test_expired_claim_is_reclaimed() {
    let gateway = TestGateway::new();
    let path = gateway
        .attachments
        .upload(ALICE, "a.png", vec![0; 16])
        .await
        .unwrap();

    // Still active: nothing to reap
    assert!(!gateway.attachments.reclaim_expired(ALICE).await.unwrap());
    assert!(gateway.blobs.contains(&path));

    gateway.claims.expire_active(ALICE);
    assert!(gateway.attachments.reclaim_expired(ALICE).await.unwrap());

    assert!(!gateway.blobs.contains(&path));
    assert_eq!(gateway.claims.data_of(ALICE), None);

    // A second expiry notice finds nothing
    assert!(!gateway.attachments.reclaim_expired(ALICE).await.unwrap());
}

#[tokio::test]
async fn test_reupload_replaces_previous_blob() {
    let gateway = TestGateway::new();
    let first = gateway
        .attachments
        .upload(ALICE, "a.png", vec![1])
        .await
        .unwrap();
    let second = gateway
        .attachments
        .upload(ALICE, "b.png", vec![2])
        .await
        .unwrap();

    assert_eq!(gateway.claims.data_of(ALICE), Some(second.clone()));
    for _ in 0..100 {
        if !gateway.blobs.contains(&first) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(!gateway.blobs.contains(&first));
    assert!(gateway.blobs.contains(&second));
}

#[tokio::test]
async fn test_discard_removes_blob_and_claim() {
    let gateway = TestGateway::new();
    let path = gateway
        .attachments
        .upload(BOB, "c.png", vec![3])
        .await
        .unwrap();

    gateway.attachments.discard_current(BOB).await.unwrap();

    assert!(!gateway.blobs.contains(&path));
    assert_eq!(gateway.claims.data_of(BOB), None);
    assert!(matches!(
        gateway.attachments.discard_current(BOB).await,
        Err(AttachmentError::NotFound)
    ));
}

#[tokio::test]
async fn test_claims_are_scoped_to_owner() {
    let gateway = TestGateway::new();
    let path = gateway
        .attachments
        .upload(ALICE, "a.png", vec![1])
        .await
        .unwrap();

    assert!(gateway.attachments.verify(ALICE, &path).await.is_ok());
    assert!(matches!(
        gateway.attachments.verify(BOB, &path).await,
        Err(AttachmentError::Rejected)
    ));
    assert_eq!(gateway.blobs.len(), 1);
}
