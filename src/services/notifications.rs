//! In-app notifications.

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ServiceError, ServiceResult},
    models::Notification,
    repository::{NotificationRepository, Repository},
};

/// Creates a notification as a side effect of another operation. Failures are logged,
/// never propagated.
pub async fn notify(repo: &dyn Repository, user_id: Uuid, kind: &str, message: &str) {
    if let Err(e) = repo.create_notification(user_id, kind, message).await {
        tracing::error!(user_id = %user_id, kind, "failed to create notification: {:?}", e);
    }
}

pub async fn list_mine(repo: &dyn Repository, user: &AuthUser) -> ServiceResult<Vec<Notification>> {
    Ok(repo.list_notifications(user.id).await?)
}

/// Only the recipient can mark a notification; anything else reads as missing.
pub async fn mark_read(repo: &dyn Repository, user: &AuthUser, notification_id: Uuid) -> ServiceResult<()> {
    if repo.mark_notification_read(notification_id, user.id).await? {
        Ok(())
    } else {
        Err(ServiceError::not_found("Notification"))
    }
}
