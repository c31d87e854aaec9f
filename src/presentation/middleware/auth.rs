//! Authentication Middleware
//!
//! Resolves the bearer token of protected HTTP routes to an identity.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    RequestExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::application::services::AuthError;
use crate::domain::Snowflake;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated user extension
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Snowflake,
}

/// Reject requests without a valid bearer token, otherwise insert
/// [`AuthUser`] into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = request
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AppError::Unauthorized("Invalid auth header.".into()))?;

    let user_id = state
        .authenticator
        .authenticate(bearer.token())
        .await
        .map_err(|e| match e {
            AuthError::Internal(msg) => AppError::Internal(msg),
            _ => AppError::Unauthorized("Authentication is required.".into()),
        })?;

    request.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(request).await)
}
