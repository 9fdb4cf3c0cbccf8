//! Admin-only endpoints. The router guards every route here with `require_admin`.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiResult, ServiceResponse},
    models::{
        AdminDashboardStats, Course, CreatePackageRequest, Payment, TeacherPackage,
        UpdateRolesRequest, User,
    },
    repository::{CourseRepository, PaymentRepository, StatsRepository, UserRepository},
    services::{accounts, payments, reminder},
};

/// get_admin_stats
///
/// [Admin Route] Dashboard totals. Revenue counts paid payments only.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Dashboard totals", body = AdminDashboardStats))
)]
pub async fn get_admin_stats(State(state): State<AppState>) -> ApiResult<AdminDashboardStats> {
    Ok(ServiceResponse::ok(state.repo.get_stats().await?))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn get_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(ServiceResponse::ok(state.repo.list_users().await?))
}

/// update_user_roles
///
/// [Admin Route] Replaces a user's role set. At least one role is required.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/roles",
    request_body = UpdateRolesRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Roles replaced", body = User),
        (status = 400, description = "Empty role set")
    )
)]
pub async fn update_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRolesRequest>,
) -> ApiResult<User> {
    let user = accounts::set_roles(&*state.repo, user_id, payload.roles).await?;
    tracing::info!(user_id = %user_id, roles = ?user.roles, "roles updated by admin");
    Ok(ServiceResponse::ok(user))
}

/// [Admin Route] Every course, drafts included.
#[utoipa::path(
    get,
    path = "/admin/courses",
    responses((status = 200, description = "All courses", body = [Course]))
)]
pub async fn get_all_courses(State(state): State<AppState>) -> ApiResult<Vec<Course>> {
    Ok(ServiceResponse::ok(state.repo.list_all_courses().await?))
}

#[utoipa::path(
    get,
    path = "/admin/payments",
    responses((status = 200, description = "All payments", body = [Payment]))
)]
pub async fn get_all_payments(State(state): State<AppState>) -> ApiResult<Vec<Payment>> {
    Ok(ServiceResponse::ok(state.repo.list_all_payments().await?))
}

/// [Admin Route] Packages, retired ones included.
#[utoipa::path(
    get,
    path = "/admin/packages",
    responses((status = 200, description = "All packages", body = [TeacherPackage]))
)]
pub async fn get_all_packages(State(state): State<AppState>) -> ApiResult<Vec<TeacherPackage>> {
    Ok(ServiceResponse::ok(payments::list_packages(&*state.repo, false).await?))
}

#[utoipa::path(
    post,
    path = "/admin/packages",
    request_body = CreatePackageRequest,
    responses(
        (status = 201, description = "Package created", body = TeacherPackage),
        (status = 400, description = "Invalid price, duration or limit")
    )
)]
pub async fn create_package(
    State(state): State<AppState>,
    Json(payload): Json<CreatePackageRequest>,
) -> ApiResult<TeacherPackage> {
    Ok(ServiceResponse::created(payments::create_package(&*state.repo, payload).await?))
}

/// run_vocabulary_reminder
///
/// [Admin Route] Runs one reminder pass immediately instead of waiting for the daily
/// schedule. Returns the number of users reminded.
#[utoipa::path(
    post,
    path = "/admin/jobs/vocabulary-reminder",
    responses((status = 200, description = "Users reminded", body = usize))
)]
pub async fn run_vocabulary_reminder(State(state): State<AppState>) -> ApiResult<usize> {
    let reminded = reminder::run_vocabulary_reminder(&*state.repo, &*state.mailer, Utc::now()).await?;
    Ok(ServiceResponse::ok(reminded))
}
