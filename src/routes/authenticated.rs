use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Every route here runs behind the `AuthUser` middleware, so handlers always receive
/// an active, verified user. Whether that user may touch a given course (owner, admin
/// or enrolled) is decided per call in `services::access`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile ---
        .route("/me", get(handlers::auth::get_me))
        .route("/me/courses", get(handlers::courses::get_my_courses))
        .route("/me/authored-courses", get(handlers::courses::get_authored_courses))
        .route("/me/streak", get(handlers::progress::get_my_streak))
        .route("/me/flashcards/due", get(handlers::flashcards::get_due_flashcards))
        .route("/me/notifications", get(handlers::notifications::get_notifications))
        .route("/me/payments", get(handlers::payments::get_my_payments))
        .route("/me/subscription", get(handlers::payments::get_my_subscription))
        // POST /upload/presigned
        // Short-lived presigned PUT URL for direct upload to object storage.
        .route("/upload/presigned", post(handlers::upload::get_presigned_url))
        // --- Courses ---
        // POST /courses
        // Admin → System course; Teacher → Teacher course (subscription quota applies).
        .route("/courses", post(handlers::courses::create_course))
        // PUT/DELETE /courses/{id}
        // Owner or admin. The public GET lives in the public router.
        .route(
            "/courses/{id}",
            put(handlers::courses::update_course).delete(handlers::courses::delete_course),
        )
        .route("/courses/{id}/manage", get(handlers::courses::get_managed_course))
        .route("/courses/{id}/publish", put(handlers::courses::publish_course))
        // POST /courses/{id}/enroll
        // Free courses only; paid courses answer 402.
        .route("/courses/{id}/enroll", post(handlers::courses::enroll_course))
        // POST /courses/{id}/checkout
        // PayOS payment link for a paid course.
        .route("/courses/{id}/checkout", post(handlers::payments::checkout_course))
        .route("/courses/{id}/progress", get(handlers::progress::get_course_progress))
        .route(
            "/courses/{id}/lessons",
            get(handlers::courses::get_lessons).post(handlers::courses::create_lesson),
        )
        // --- Lessons & modules ---
        .route(
            "/lessons/{id}",
            put(handlers::courses::update_lesson).delete(handlers::courses::delete_lesson),
        )
        .route(
            "/lessons/{id}/modules",
            get(handlers::courses::get_modules).post(handlers::courses::create_module),
        )
        .route(
            "/modules/{id}",
            get(handlers::courses::get_module)
                .put(handlers::courses::update_module)
                .delete(handlers::courses::delete_module),
        )
        // POST /modules/{id}/complete
        // Idempotent; also counts toward the daily streak.
        .route("/modules/{id}/complete", post(handlers::progress::complete_module))
        // --- Quizzes ---
        .route(
            "/modules/{id}/quiz",
            get(handlers::quizzes::get_module_quiz).post(handlers::quizzes::create_quiz),
        )
        .route("/quizzes/{id}", put(handlers::quizzes::update_quiz))
        .route("/quizzes/{id}/content", get(handlers::quizzes::get_quiz_content))
        .route("/quizzes/{id}/sections", post(handlers::quizzes::add_section))
        .route("/sections/{id}/groups", post(handlers::quizzes::add_group))
        .route("/sections/{id}/questions", post(handlers::quizzes::add_question))
        .route("/questions/{id}", delete(handlers::quizzes::delete_question))
        // --- Attempts ---
        // POST starts (or resumes) an attempt; GET lists the caller's attempts.
        .route(
            "/quizzes/{id}/attempts",
            get(handlers::attempts::get_my_attempts).post(handlers::attempts::start_attempt),
        )
        .route("/attempts/{id}", get(handlers::attempts::get_attempt))
        .route("/attempts/{id}/answers", put(handlers::attempts::save_answer))
        .route("/attempts/{id}/submit", post(handlers::attempts::submit_attempt))
        .route("/attempts/{id}/result", get(handlers::attempts::get_attempt_result))
        // --- Essays ---
        .route(
            "/modules/{id}/essay",
            get(handlers::essays::get_module_essay).post(handlers::essays::create_essay),
        )
        .route(
            "/essays/{id}/submissions",
            get(handlers::essays::get_submissions).post(handlers::essays::submit_essay),
        )
        .route("/essays/{id}/submissions/me", get(handlers::essays::get_my_submission))
        .route("/submissions/{id}/grade", put(handlers::essays::grade_submission))
        // --- Flashcards ---
        .route(
            "/modules/{id}/flashcards",
            get(handlers::flashcards::get_flashcards).post(handlers::flashcards::create_flashcard),
        )
        .route("/flashcards/{id}", delete(handlers::flashcards::delete_flashcard))
        .route("/flashcards/{id}/review", post(handlers::flashcards::review_flashcard))
        // --- Payments ---
        .route("/packages/{id}/checkout", post(handlers::payments::checkout_subscription))
        .route("/payments/{order_code}", get(handlers::payments::get_payment))
        .route("/payments/{order_code}/cancel", post(handlers::payments::cancel_payment))
        // --- Notifications ---
        .route(
            "/notifications/{id}/read",
            put(handlers::notifications::mark_notification_read),
        )
}
