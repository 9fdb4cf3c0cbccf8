use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Nested under `/admin`. `create_router` wraps this router in the `require_admin`
/// middleware, which authenticates the caller and rejects anyone without the Admin role
/// before a handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Users, courses, enrollments, attempts, revenue and pending payments.
        .route("/stats", get(handlers::admin::get_admin_stats))
        .route("/users", get(handlers::admin::get_users))
        // PUT /admin/users/{id}/roles
        // Replaces the role set; takes effect on the user's next request.
        .route("/users/{id}/roles", put(handlers::admin::update_user_roles))
        // GET /admin/courses
        // All courses, unpublished drafts included.
        .route("/courses", get(handlers::admin::get_all_courses))
        .route("/payments", get(handlers::admin::get_all_payments))
        .route(
            "/packages",
            get(handlers::admin::get_all_packages).post(handlers::admin::create_package),
        )
        // POST /admin/jobs/vocabulary-reminder
        // Runs the daily reminder pass on demand.
        .route(
            "/jobs/vocabulary-reminder",
            post(handlers::admin::run_vocabulary_reminder),
        )
}
