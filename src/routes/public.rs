use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Catalogue reads only ever return published
/// courses; everything else here either creates a session or is authenticated by its
/// own means (the PayOS webhook signature).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates an inactive account and mails the activation code.
        .route("/auth/register", post(handlers::auth::register))
        // POST /auth/verify-otp
        // Activates the account and returns a token.
        .route("/auth/verify-otp", post(handlers::auth::verify_otp))
        // POST /auth/resend-otp
        .route("/auth/resend-otp", post(handlers::auth::resend_otp))
        // POST /auth/login
        .route("/auth/login", post(handlers::auth::login))
        // GET /courses?search=...&course_type=...
        // The published catalogue.
        .route("/courses", get(handlers::courses::get_courses))
        // GET /courses/{id}
        // Outline of one published course. Drafts answer 404.
        .route("/courses/{id}", get(handlers::courses::get_course_outline))
        // GET /packages
        // Teacher subscription packages on sale.
        .route("/packages", get(handlers::payments::get_packages))
        // POST /payments/webhook
        // PayOS payment callback; verified by checksum signature.
        .route("/payments/webhook", post(handlers::payments::payos_webhook))
}
