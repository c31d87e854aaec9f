//! User entity and repository trait.
//!
//! Maps to the `users` table. Account management lives elsewhere; this
//! service only resolves identities and renders previews.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Snowflake;
use crate::shared::error::AppError;

/// A registered user.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: VARCHAR(30) NOT NULL
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - avatar: TEXT NULL (blob path)
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Snowflake,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public projection of this user.
    pub fn preview(&self) -> UserPreview {
        UserPreview {
            id: self.id,
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// What other users get to see: no email, no timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreview {
    pub id: Snowflake,
    pub name: String,
    pub avatar: Option<String>,
}

/// Repository trait for User lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by id.
    async fn find_by_id(&self, id: Snowflake) -> Result<Option<User>, AppError>;

    /// Check whether a user id is registered.
    async fn exists(&self, id: Snowflake) -> Result<bool, AppError>;
}
