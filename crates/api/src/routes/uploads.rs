//! Image uploads.

use axum::{extract::State, http::StatusCode};

use crate::error::AppError;
use crate::extract::{Json, Multipart, Path};
use crate::middleware::AuthUser;
use crate::services::uploads::{StoredUpload, UploadError, UploadFeature};
use crate::state::AppState;

/// Store the multipart field `file` under `feature`.
///
/// POST /api/v1/uploads/{feature}
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(feature): Path<String>,
    Multipart(mut multipart): Multipart,
) -> Result<(StatusCode, Json<StoredUpload>), AppError> {
    let feature: UploadFeature = feature.parse()?;
    if !feature.allowed_for(user.role) {
        return Err(AppError::forbidden(format!(
            "{} cannot upload {} images",
            user.role,
            feature.as_str()
        )));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_owned();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        let stored = state
            .uploads()
            .store(feature, &content_type, &data)
            .await?;
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(UploadError::MissingFile.into())
}
