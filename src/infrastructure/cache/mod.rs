//! Cache Module
//!
//! Redis connection management and the attachment claim store.
//!
//! ```text
//! +---------------------+        +--------------------+
//! |  AttachmentService  |        |   ExpiryWatcher    |
//! +---------------------+        +--------------------+
//!           |                              |
//!           v                              v
//! +---------------------+        +--------------------+
//! |  RedisClaimStore    |        |  pub/sub (pattern) |
//! +---------------------+        +--------------------+
//!           |                              |
//!           v                              v
//! +---------------------+        +--------------------+
//! | ConnectionManager   |        |  dedicated conn    |
//! +---------------------+        +--------------------+
//! ```

mod claim_store;
mod expiry_watcher;

pub use claim_store::RedisClaimStore;
pub use expiry_watcher::{enable_expiry_notifications, ExpiryWatcher, WatchState};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Key layout for attachment claims.
///
/// ```text
/// temp:image:expire:{owner}  -> "1"   (active key, short TTL)
/// temp:image:data:{owner}    -> path  (data key, longer TTL)
/// ```
pub mod keys {
    use crate::domain::Snowflake;

    /// Prefix of the active key; its expiry drives cleanup
    pub const CLAIM_ACTIVE: &str = "temp:image:expire:";

    /// Prefix of the data key holding the blob path
    pub const CLAIM_DATA: &str = "temp:image:data:";

    #[inline]
    pub fn claim_active(owner: Snowflake) -> String {
        format!("{}{}", CLAIM_ACTIVE, owner)
    }

    #[inline]
    pub fn claim_data(owner: Snowflake) -> String {
        format!("{}{}", CLAIM_DATA, owner)
    }

    /// Owner encoded in an active key, if `key` is one.
    pub fn claim_owner(key: &str) -> Option<Snowflake> {
        key.strip_prefix(CLAIM_ACTIVE)?.parse().ok()
    }

}
