//! Redis-backed attachment claims.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};

use super::keys;
use crate::domain::{AttachmentClaims, ClaimError, Snowflake};

impl From<redis::RedisError> for ClaimError {
    fn from(e: redis::RedisError) -> Self {
        ClaimError::Store(e.to_string())
    }
}

// Returns the data key only once the active key is gone.
const ORPHANED_SCRIPT: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 1 then
        return false
    end
    return redis.call('GET', KEYS[2])
"#;

// Compare-and-delete so a claim reissued in the meantime survives.
const DISCARD_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

/// Claims stored as two expiring keys per owner.
#[derive(Clone)]
pub struct RedisClaimStore {
    conn: ConnectionManager,
    active_ttl_secs: u64,
    data_ttl_secs: u64,
}

impl RedisClaimStore {
    pub fn new(conn: ConnectionManager, active_ttl_secs: u64, data_ttl_secs: u64) -> Self {
        Self {
            conn,
            active_ttl_secs,
            data_ttl_secs: data_ttl_secs.max(active_ttl_secs + 1),
        }
    }
}

#[async_trait]
impl AttachmentClaims for RedisClaimStore {
    #[instrument(skip(self), level = "debug")]
    async fn issue(&self, owner: Snowflake, path: &str) -> Result<Option<String>, ClaimError> {
        let mut conn = self.conn.clone();

        // SET ... GET swaps the data key and hands back the superseded path
        let (previous,): (Option<String>,) = redis::pipe()
            .atomic()
            .set_ex(keys::claim_active(owner), "1", self.active_ttl_secs)
            .ignore()
            .cmd("SET")
            .arg(keys::claim_data(owner))
            .arg(path)
            .arg("EX")
            .arg(self.data_ttl_secs)
            .arg("GET")
            .query_async(&mut conn)
            .await?;

        debug!(owner = %owner, superseded = previous.is_some(), "Attachment claim issued");
        Ok(previous)
    }

    async fn get(&self, owner: Snowflake) -> Result<String, ClaimError> {
        let mut conn = self.conn.clone();
        let path: Option<String> = conn.get(keys::claim_data(owner)).await?;
        path.ok_or(ClaimError::NotFound)
    }

    #[instrument(skip(self), level = "debug")]
    async fn consume(&self, owner: Snowflake) -> Result<(), ClaimError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(&[keys::claim_active(owner), keys::claim_data(owner)])
            .await?;
        Ok(())
    }

    async fn orphaned(&self, owner: Snowflake) -> Result<Option<String>, ClaimError> {
        let mut conn = self.conn.clone();
        let path: Option<String> = redis::Script::new(ORPHANED_SCRIPT)
            .key(keys::claim_active(owner))
            .key(keys::claim_data(owner))
            .invoke_async(&mut conn)
            .await?;
        Ok(path)
    }

    #[instrument(skip(self), level = "debug")]
    async fn discard(&self, owner: Snowflake, path: &str) -> Result<(), ClaimError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::Script::new(DISCARD_SCRIPT)
            .key(keys::claim_data(owner))
            .arg(path)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}
