use axum::extract::{Path, State};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::Notification,
    services::notifications,
};

/// get_notifications
///
/// [Authenticated Route] The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/me/notifications",
    responses((status = 200, description = "Notifications", body = [Notification]))
)]
pub async fn get_notifications(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<Notification>> {
    Ok(ServiceResponse::ok(notifications::list_mine(&*state.repo, &user).await?))
}

#[utoipa::path(
    put,
    path = "/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Not found or not the recipient")
    )
)]
pub async fn mark_notification_read(
    user: AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<()> {
    notifications::mark_read(&*state.repo, &user, notification_id).await?;
    Ok(ServiceResponse::ok(()).message("Notification marked as read"))
}
