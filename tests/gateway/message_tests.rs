//! Last Message Pointer Tests
//!
//! Pointer writes run in the background and may finish out of order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use dm_gateway::application::services::{MessageService, MessageServiceImpl, NewMessage};
use dm_gateway::domain::{Conversation, ConversationRepository, ConversationSummary, Snowflake};
use dm_gateway::shared::background::BackgroundTasks;
use dm_gateway::shared::error::AppError;
use dm_gateway::shared::snowflake::SnowflakeGenerator;

use crate::common::*;

const CONV: Snowflake = Snowflake(700);

/// Conversation store whose first pointer advance stalls, so the write for
/// an older message lands after the one for a newer message.
struct StalledFirstAdvance {
    inner: Arc<MemoryStore>,
    stalled: AtomicBool,
}

#[async_trait]
impl ConversationRepository for StalledFirstAdvance {
    async fn find_for_participant(
        &self,
        id: Snowflake,
        participant: Snowflake,
    ) -> Result<Option<Conversation>, AppError> {
        self.inner.find_for_participant(id, participant).await
    }

    async fn find_by_participants(
        &self,
        a: Snowflake,
        b: Snowflake,
    ) -> Result<Option<Conversation>, AppError> {
        self.inner.find_by_participants(a, b).await
    }

    async fn counterpart_ids(&self, user: Snowflake) -> Result<Vec<Snowflake>, AppError> {
        self.inner.counterpart_ids(user).await
    }

    async fn list_for_user(&self, user: Snowflake) -> Result<Vec<ConversationSummary>, AppError> {
        self.inner.list_for_user(user).await
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), AppError> {
        ConversationRepository::create(self.inner.as_ref(), conversation).await
    }

    async fn advance_last_message(
        &self,
        id: Snowflake,
        message_id: Snowflake,
    ) -> Result<bool, AppError> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        self.inner.advance_last_message(id, message_id).await
    }

    async fn retract_last_message(
        &self,
        id: Snowflake,
        deleted: Snowflake,
    ) -> Result<bool, AppError> {
        self.inner.retract_last_message(id, deleted).await
    }
}

fn setup() -> (Arc<MemoryStore>, MessageServiceImpl<MemoryStore, StalledFirstAdvance>) {
    let store = Arc::new(MemoryStore::default());
    store.add_conversation(CONV, ALICE, BOB);
    let conversations = Arc::new(StalledFirstAdvance {
        inner: store.clone(),
        stalled: AtomicBool::new(false),
    });
    let service = MessageServiceImpl::new(
        store.clone(),
        conversations,
        Arc::new(SnowflakeGenerator::new(1)),
        BackgroundTasks::new(4),
    );
    (store, service)
}

async fn send(service: &impl MessageService, text: &str) -> Snowflake {
    service
        .send_direct(NewMessage {
            conversation_id: CONV,
            sender: ALICE,
            text: text.into(),
            image: None,
        })
        .await
        .unwrap()
        .message
        .id
}

#[tokio::test]
async fn test_late_pointer_write_does_not_regress() {
    let (store, service) = setup();

    let first = send(&service, "one").await;
    let second = send(&service, "two").await;
    assert!(first < second);

    wait_until(|| store.last_message_of(CONV) == Some(second)).await;
    // Outlast the stalled write for `first`
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(store.last_message_of(CONV), Some(second));
}

#[tokio::test]
async fn test_deleting_older_message_keeps_pointer() {
    let (store, service) = setup();

    let first = send(&service, "one").await;
    let second = send(&service, "two").await;
    wait_until(|| store.last_message_of(CONV) == Some(second)).await;

    service.delete_message(first, ALICE).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.last_message_of(CONV), Some(second));
}

#[tokio::test]
async fn test_deleting_latest_message_falls_back() {
    let (store, service) = setup();

    let first = send(&service, "one").await;
    let second = send(&service, "two").await;
    wait_until(|| store.last_message_of(CONV) == Some(second)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    service.delete_message(second, ALICE).await.unwrap();
    wait_until(|| store.last_message_of(CONV) == Some(first)).await;

    service.delete_message(first, ALICE).await.unwrap();
    wait_until(|| store.last_message_of(CONV).is_none()).await;
}
