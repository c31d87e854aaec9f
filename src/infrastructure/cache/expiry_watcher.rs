//! Expiry watcher
//!
//! Listens for key-expiration events and reports the owner of every expired
//! active claim key. Delivery is at-most-once: events published while the
//! subscription is down are lost, and the data key's own TTL is the backstop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{debug, info, warn};

use super::keys;
use crate::domain::Snowflake;

const EXPIRED_PATTERN: &str = "__keyevent@*__:expired";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Ask the server to publish expiry events. Managed deployments often forbid
/// `CONFIG`, in which case the setting must be applied out of band.
pub async fn enable_expiry_notifications(conn: &mut ConnectionManager) {
    let result = redis::cmd("CONFIG")
        .arg("SET")
        .arg("notify-keyspace-events")
        .arg("Ex")
        .query_async::<()>(conn)
        .await;
    match result {
        Ok(()) => info!("Redis keyspace expiry notifications enabled"),
        Err(e) => warn!(error = %e, "Could not enable keyspace notifications; expired claims rely on data-key TTL"),
    }
}

/// Whether the watcher currently holds a live subscription. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct WatchState(Arc<AtomicBool>);

impl WatchState {
    pub fn is_subscribed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, subscribed: bool) {
        self.0.store(subscribed, Ordering::Release);
    }
}

/// Subscription to expired claim keys.
pub struct ExpiryWatcher {
    client: Client,
    on_expired: Arc<dyn Fn(Snowflake) + Send + Sync>,
    state: WatchState,
}

impl ExpiryWatcher {
    /// `on_expired` runs on the watcher task and must not block.
    pub fn new<F>(client: Client, on_expired: F) -> Self
    where
        F: Fn(Snowflake) + Send + Sync + 'static,
    {
        Self {
            client,
            on_expired: Arc::new(on_expired),
            state: WatchState::default(),
        }
    }

    /// Handle for reporting the subscription in readiness checks.
    pub fn state(&self) -> WatchState {
        self.state.clone()
    }

    /// Run until aborted, resubscribing with backoff after failures.
    pub async fn run(self) {
        let mut backoff = Duration::from_millis(500);
        loop {
            let outcome = self.listen().await;
            self.state.set(false);
            match outcome {
                Ok(()) => {
                    warn!("Expiry subscription ended, resubscribing");
                    backoff = Duration::from_millis(500);
                }
                Err(e) => {
                    warn!(error = %e, retry_in_ms = backoff.as_millis() as u64, "Expiry subscription failed");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn listen(&self) -> Result<(), redis::RedisError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(EXPIRED_PATTERN).await?;
        self.state.set(true);
        info!(pattern = EXPIRED_PATTERN, "Watching attachment claim expiry");

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let key: String = match msg.get_payload() {
                Ok(key) => key,
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable expiry event");
                    continue;
                }
            };
            if let Some(owner) = keys::claim_owner(&key) {
                debug!(owner = %owner, "Attachment claim expired");
                (self.on_expired)(owner);
            }
        }
        Ok(())
    }
}
