use axum::{Json, extract::State};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceError, ServiceResponse},
    models::{PresignedUrlRequest, PresignedUrlResponse},
    services::require_text,
    storage::object_key,
};

/// get_presigned_url
///
/// [Authenticated Route] Issues a ten minute presigned PUT URL so the client uploads
/// straight to object storage. The key is `{purpose}/{uuid}.{ext}`; nothing of the
/// client's filename survives except a sanitized extension.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "Upload URL", body = PresignedUrlResponse),
        (status = 400, description = "Missing file type")
    )
)]
pub async fn get_presigned_url(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> ApiResult<PresignedUrlResponse> {
    require_text(&payload.file_type, "File type")?;

    let key = object_key(payload.purpose, &payload.filename, Uuid::new_v4());
    let upload_url = state
        .storage
        .get_presigned_upload_url(&key, &payload.file_type)
        .await
        .map_err(|e| ServiceError::Internal(format!("presign failed for {}: {}", key, e)))?;

    tracing::debug!(user_id = %user_id, key = %key, "issued presigned upload url");
    Ok(ServiceResponse::ok(PresignedUrlResponse { upload_url, resource_key: key }))
}
