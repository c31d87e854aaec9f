//! Authentication Service
//!
//! Verifies bearer tokens issued by the account service and resolves them to
//! an identity. Tokens are HS256 JWTs whose subject is the user id.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtSettings;
use crate::domain::{Snowflake, UserRepository};

/// Resolves a bearer credential to an identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Snowflake, AuthError>;
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    Missing,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Authenticator backed by a shared HS256 secret and the user store.
pub struct JwtAuthenticator<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl<U> JwtAuthenticator<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, jwt_settings: &JwtSettings) -> Self {
        Self {
            user_repo,
            decoding_key: DecodingKey::from_secret(jwt_settings.secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decode and validate a token, returning its subject.
    fn decode_subject(&self, token: &str) -> Result<Snowflake, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;

        token_data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[async_trait]
impl<U> Authenticator for JwtAuthenticator<U>
where
    U: UserRepository + 'static,
{
    async fn authenticate(&self, token: &str) -> Result<Snowflake, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Missing);
        }
        let user_id = self.decode_subject(token)?;

        let exists = self
            .user_repo
            .exists(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if !exists {
            return Err(AuthError::UserNotFound);
        }

        Ok(user_id)
    }
}
