use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::{AttemptResult, AttemptView, QuizAttempt, QuizUserAnswer, SaveAnswerRequest},
    services::quiz_attempt,
};

/// start_attempt
///
/// [Authenticated Route] Starts a new attempt, or resumes the caller's running one.
/// The returned view carries the shuffled layout without any correctness data.
#[utoipa::path(
    post,
    path = "/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Attempt view", body = AttemptView),
        (status = 403, description = "Not enrolled"),
        (status = 409, description = "No attempts left")
    )
)]
pub async fn start_attempt(
    user: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<AttemptView> {
    let view = quiz_attempt::start_attempt(&*state.repo, &user, quiz_id, Utc::now()).await?;
    Ok(ServiceResponse::ok(view))
}

#[utoipa::path(
    get,
    path = "/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses((status = 200, description = "The caller's attempts", body = [QuizAttempt]))
)]
pub async fn get_my_attempts(
    user: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<Vec<QuizAttempt>> {
    Ok(ServiceResponse::ok(quiz_attempt::list_attempts(&*state.repo, &user, quiz_id).await?))
}

#[utoipa::path(
    get,
    path = "/attempts/{id}",
    params(("id" = Uuid, Path, description = "Attempt id")),
    responses((status = 200, description = "Attempt view", body = AttemptView))
)]
pub async fn get_attempt(
    user: AuthUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> ApiResult<AttemptView> {
    let view = quiz_attempt::get_attempt_view(&*state.repo, &user, attempt_id, Utc::now()).await?;
    Ok(ServiceResponse::ok(view))
}

/// save_answer
///
/// [Authenticated Route] Scores and stores one answer. Saving again replaces it.
#[utoipa::path(
    put,
    path = "/attempts/{id}/answers",
    request_body = SaveAnswerRequest,
    params(("id" = Uuid, Path, description = "Attempt id")),
    responses(
        (status = 200, description = "Answer saved", body = QuizUserAnswer),
        (status = 400, description = "Question not in this attempt, or answer does not fit it"),
        (status = 409, description = "Attempt finished or expired")
    )
)]
pub async fn save_answer(
    user: AuthUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    Json(payload): Json<SaveAnswerRequest>,
) -> ApiResult<QuizUserAnswer> {
    let answer = quiz_attempt::save_answer(&*state.repo, &user, attempt_id, payload, Utc::now()).await?;
    Ok(ServiceResponse::ok(answer))
}

#[utoipa::path(
    post,
    path = "/attempts/{id}/submit",
    params(("id" = Uuid, Path, description = "Attempt id")),
    responses(
        (status = 200, description = "Graded attempt", body = AttemptResult),
        (status = 409, description = "Already submitted")
    )
)]
pub async fn submit_attempt(
    user: AuthUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> ApiResult<AttemptResult> {
    let result = quiz_attempt::submit(&*state.repo, &user, attempt_id, Utc::now()).await?;
    Ok(ServiceResponse::ok(result).message("Attempt submitted"))
}

#[utoipa::path(
    get,
    path = "/attempts/{id}/result",
    params(("id" = Uuid, Path, description = "Attempt id")),
    responses(
        (status = 200, description = "Graded attempt", body = AttemptResult),
        (status = 409, description = "Attempt still running")
    )
)]
pub async fn get_attempt_result(
    user: AuthUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> ApiResult<AttemptResult> {
    Ok(ServiceResponse::ok(quiz_attempt::get_attempt_result(&*state.repo, &user, attempt_id).await?))
}
