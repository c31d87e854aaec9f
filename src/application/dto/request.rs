//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::domain::Snowflake;

fn validate_snowflake(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Snowflake>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("snowflake").with_message("Invalid user ID".into()))
}

/// Start a conversation with another user
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[validate(custom(function = "validate_snowflake"))]
    pub target_user_id: String,
}

impl CreateConversationRequest {
    /// Parsed target; only meaningful after `validate()` succeeded.
    pub fn target(&self) -> Option<Snowflake> {
        self.target_user_id.parse().ok()
    }
}

/// `?page=N` on history listings
#[derive(Debug, Default, Deserialize, Validate)]
pub struct HistoryQuery {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
}

impl HistoryQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }
}

/// `?token=...` on the socket upgrade
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_conversation_validates_target() {
        let ok = CreateConversationRequest {
            target_user_id: "123".into(),
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.target(), Some(Snowflake(123)));

        let bad = CreateConversationRequest {
            target_user_id: "abc".into(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_history_page_defaults_to_one() {
        assert_eq!(HistoryQuery::default().page(), 1);
        assert!(HistoryQuery { page: Some(0) }.validate().is_err());
    }
}
