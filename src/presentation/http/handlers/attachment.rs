//! Attachment Handlers
//!
//! Image uploads for chat messages. Each upload becomes the caller's single
//! pending claim until a message references it or it expires.

use axum::{
    extract::{Extension, Multipart, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{MessageResponse, UploadResponse};
use crate::application::services::AttachmentError;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Multipart field carrying the file
const IMAGE_FIELD: &str = "image";

/// Upload an image and claim it for the caller
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(AppError::BadRequest("Only image files are allowed.".into()));
        }
        let filename = field.file_name().unwrap_or("image").to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Couldn't read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Image is empty.".into()));
        }
        if bytes.len() > state.settings.attachments.max_upload_bytes {
            return Err(AppError::BadRequest("Image is too large.".into()));
        }

        let path = state
            .attachments
            .upload(auth.user_id, &filename, bytes.to_vec())
            .await
            .map_err(|e| {
                tracing::warn!(user_id = %auth.user_id, error = %e, "Upload failed");
                AppError::Internal(format!("Upload failed: {e}"))
            })?;

        tracing::debug!(user_id = %auth.user_id, path = %path, "Image uploaded");
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "Image uploaded successfully.",
                path,
            }),
        ));
    }

    Err(AppError::BadRequest(format!("Missing \"{IMAGE_FIELD}\" file.")))
}

/// Drop the caller's pending image
pub async fn discard_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .attachments
        .discard_current(auth.user_id)
        .await
        .map_err(|e| match e {
            AttachmentError::NotFound => AppError::NotFound("No pending image.".into()),
            e => AppError::Internal(e.to_string()),
        })?;

    Ok(Json(MessageResponse {
        message: "Image discarded.",
    }))
}
