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
    models::{CreateEssayRequest, Essay, EssaySubmission, GradeEssayRequest, SubmitEssayRequest},
    services::essays,
};

#[utoipa::path(
    post,
    path = "/modules/{id}/essay",
    request_body = CreateEssayRequest,
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 201, description = "Essay created", body = Essay),
        (status = 409, description = "Module already has an essay")
    )
)]
pub async fn create_essay(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    Json(payload): Json<CreateEssayRequest>,
) -> ApiResult<Essay> {
    let essay = essays::create_essay(&*state.repo, &user, module_id, payload).await?;
    Ok(ServiceResponse::created(essay))
}

#[utoipa::path(
    get,
    path = "/modules/{id}/essay",
    params(("id" = Uuid, Path, description = "Module id")),
    responses((status = 200, description = "Essay prompt", body = Essay))
)]
pub async fn get_module_essay(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<Essay> {
    Ok(ServiceResponse::ok(essays::get_essay_for_module(&*state.repo, &user, module_id).await?))
}

/// submit_essay
///
/// [Authenticated Route] Creates or replaces the caller's submission until it is graded.
#[utoipa::path(
    post,
    path = "/essays/{id}/submissions",
    request_body = SubmitEssayRequest,
    params(("id" = Uuid, Path, description = "Essay id")),
    responses(
        (status = 200, description = "Submission stored", body = EssaySubmission),
        (status = 409, description = "Already graded")
    )
)]
pub async fn submit_essay(
    user: AuthUser,
    State(state): State<AppState>,
    Path(essay_id): Path<Uuid>,
    Json(payload): Json<SubmitEssayRequest>,
) -> ApiResult<EssaySubmission> {
    let submission = essays::submit_essay(&*state.repo, &user, essay_id, payload, Utc::now()).await?;
    Ok(ServiceResponse::ok(submission))
}

#[utoipa::path(
    get,
    path = "/essays/{id}/submissions/me",
    params(("id" = Uuid, Path, description = "Essay id")),
    responses((status = 200, description = "The caller's submission", body = EssaySubmission))
)]
pub async fn get_my_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(essay_id): Path<Uuid>,
) -> ApiResult<EssaySubmission> {
    Ok(ServiceResponse::ok(essays::my_submission(&*state.repo, &user, essay_id).await?))
}

/// [Authenticated Route] Every learner's submission. Authors only.
#[utoipa::path(
    get,
    path = "/essays/{id}/submissions",
    params(("id" = Uuid, Path, description = "Essay id")),
    responses((status = 200, description = "Submissions", body = [EssaySubmission]))
)]
pub async fn get_submissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(essay_id): Path<Uuid>,
) -> ApiResult<Vec<EssaySubmission>> {
    Ok(ServiceResponse::ok(essays::list_submissions(&*state.repo, &user, essay_id).await?))
}

#[utoipa::path(
    put,
    path = "/submissions/{id}/grade",
    request_body = GradeEssayRequest,
    params(("id" = Uuid, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Graded", body = EssaySubmission),
        (status = 400, description = "Score out of range")
    )
)]
pub async fn grade_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<GradeEssayRequest>,
) -> ApiResult<EssaySubmission> {
    let graded = essays::grade_submission(&*state.repo, &user, submission_id, payload, Utc::now()).await?;
    Ok(ServiceResponse::ok(graded))
}
