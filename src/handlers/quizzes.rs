use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiResult, ServiceResponse},
    models::{
        CreateGroupRequest, CreateQuestionRequest, CreateQuizRequest, CreateSectionRequest,
        Question, Quiz, QuizContent, QuizGroup, QuizSection, UpdateQuizRequest,
    },
    services::quiz_authoring,
};

/// create_quiz
///
/// [Authenticated Route] Attaches a quiz to an Assessment module of kind Quiz.
#[utoipa::path(
    post,
    path = "/modules/{id}/quiz",
    request_body = CreateQuizRequest,
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 201, description = "Quiz created", body = Quiz),
        (status = 400, description = "Module is not a quiz module or settings invalid"),
        (status = 409, description = "Module already has a quiz")
    )
)]
pub async fn create_quiz(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    Json(payload): Json<CreateQuizRequest>,
) -> ApiResult<Quiz> {
    let quiz = quiz_authoring::create_quiz(&*state.repo, &user, module_id, payload).await?;
    Ok(ServiceResponse::created(quiz))
}

/// [Authenticated Route] Quiz settings for a module, visible to enrolled learners.
#[utoipa::path(
    get,
    path = "/modules/{id}/quiz",
    params(("id" = Uuid, Path, description = "Module id")),
    responses((status = 200, description = "Quiz settings", body = Quiz))
)]
pub async fn get_module_quiz(
    user: AuthUser,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<Quiz> {
    Ok(ServiceResponse::ok(quiz_authoring::get_quiz_for_module(&*state.repo, &user, module_id).await?))
}

#[utoipa::path(
    put,
    path = "/quizzes/{id}",
    request_body = UpdateQuizRequest,
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses((status = 200, description = "Quiz updated", body = Quiz))
)]
pub async fn update_quiz(
    user: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<UpdateQuizRequest>,
) -> ApiResult<Quiz> {
    Ok(ServiceResponse::ok(quiz_authoring::update_quiz(&*state.repo, &user, quiz_id, payload).await?))
}

/// get_quiz_content
///
/// [Authenticated Route] The full authoring tree, correct answers included. Authors only.
#[utoipa::path(
    get,
    path = "/quizzes/{id}/content",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Sections, groups and questions", body = QuizContent),
        (status = 403, description = "Not the author")
    )
)]
pub async fn get_quiz_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<QuizContent> {
    Ok(ServiceResponse::ok(quiz_authoring::get_quiz_content(&*state.repo, &user, quiz_id).await?))
}

#[utoipa::path(
    post,
    path = "/quizzes/{id}/sections",
    request_body = CreateSectionRequest,
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses((status = 201, description = "Section created", body = QuizSection))
)]
pub async fn add_section(
    user: AuthUser,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<CreateSectionRequest>,
) -> ApiResult<QuizSection> {
    let section = quiz_authoring::add_section(&*state.repo, &user, quiz_id, payload).await?;
    Ok(ServiceResponse::created(section))
}

#[utoipa::path(
    post,
    path = "/sections/{id}/groups",
    request_body = CreateGroupRequest,
    params(("id" = Uuid, Path, description = "Section id")),
    responses((status = 201, description = "Group created", body = QuizGroup))
)]
pub async fn add_group(
    user: AuthUser,
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
    Json(payload): Json<CreateGroupRequest>,
) -> ApiResult<QuizGroup> {
    let group = quiz_authoring::add_group(&*state.repo, &user, section_id, payload).await?;
    Ok(ServiceResponse::created(group))
}

/// add_question
///
/// [Authenticated Route] Adds a question with its options. The option set is checked
/// against the question type before anything is stored.
#[utoipa::path(
    post,
    path = "/sections/{id}/questions",
    request_body = CreateQuestionRequest,
    params(("id" = Uuid, Path, description = "Section id")),
    responses(
        (status = 201, description = "Question created", body = Question),
        (status = 400, description = "Options do not fit the question type")
    )
)]
pub async fn add_question(
    user: AuthUser,
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> ApiResult<Question> {
    let question = quiz_authoring::add_question(&*state.repo, &user, section_id, payload).await?;
    Ok(ServiceResponse::created(question))
}

#[utoipa::path(
    delete,
    path = "/questions/{id}",
    params(("id" = Uuid, Path, description = "Question id")),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_question(
    user: AuthUser,
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
) -> ApiResult<()> {
    quiz_authoring::delete_question(&*state.repo, &user, question_id).await?;
    Ok(ServiceResponse::ok(()).message("Question deleted"))
}
