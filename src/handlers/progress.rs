use axum::extract::{Path, State};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::{CourseProgress, UserStreak},
    services::progress,
};

/// complete_module
///
/// [Authenticated Route] Marks a module complete for the caller (idempotent) and
/// returns the refreshed progress of its course.
#[utoipa::path(
    post,
    path = "/modules/{id}/complete",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Course progress", body = CourseProgress),
        (status = 403, description = "Not enrolled")
    )
)]
pub async fn complete_module(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<CourseProgress> {
    let progress = progress::complete_module(&*state.repo, &user, module_id, Utc::now()).await?;
    Ok(ServiceResponse::ok(progress))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/progress",
    params(("id" = Uuid, Path, description = "Course id")),
    responses((status = 200, description = "Course progress", body = CourseProgress))
)]
pub async fn get_course_progress(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CourseProgress> {
    Ok(ServiceResponse::ok(progress::course_progress(&*state.repo, &user, course_id).await?))
}

#[utoipa::path(
    get,
    path = "/me/streak",
    responses((status = 200, description = "Learning streak", body = UserStreak))
)]
pub async fn get_my_streak(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<UserStreak> {
    Ok(ServiceResponse::ok(progress::get_streak(&*state.repo, id).await?))
}
