//! Quiz authoring: settings, sections, groups and questions of assessment modules.

use uuid::Uuid;

use super::{
    access::{module_with_course, quiz_with_course, require_author, require_view, section_with_course},
    courses::next_position,
    require_text,
};
use crate::{
    auth::AuthUser,
    error::{ServiceError, ServiceResult},
    models::{
        AssessmentKind, ContentType, CreateGroupRequest, CreateQuestionRequest, CreateQuizRequest,
        CreateSectionRequest, Module, Question, Quiz, QuizContent, QuizGroup, QuizSection,
        UpdateQuizRequest,
    },
    quiz::validation::{check_settings, validate_question, validate_quiz_settings},
    repository::Repository,
};

pub(crate) fn ensure_module_kind(module: &Module, kind: AssessmentKind) -> ServiceResult<()> {
    if module.content_type != ContentType::Assessment || module.assessment_kind != Some(kind) {
        return Err(ServiceError::BadRequest(format!(
            "Module is not a {:?} assessment",
            kind
        )));
    }
    Ok(())
}

pub async fn create_quiz(
    repo: &dyn Repository,
    user: &AuthUser,
    module_id: Uuid,
    req: CreateQuizRequest,
) -> ServiceResult<Quiz> {
    let (module, course) = module_with_course(repo, module_id).await?;
    require_author(user, &course)?;
    ensure_module_kind(&module, AssessmentKind::Quiz)?;
    validate_quiz_settings(&req).map_err(ServiceError::BadRequest)?;

    if repo.get_quiz_by_module(module_id).await?.is_some() {
        return Err(ServiceError::Conflict("This module already has a quiz".to_string()));
    }
    Ok(repo.create_quiz(module_id, req).await?)
}

pub async fn update_quiz(
    repo: &dyn Repository,
    user: &AuthUser,
    quiz_id: Uuid,
    req: UpdateQuizRequest,
) -> ServiceResult<Quiz> {
    let (quiz, course) = quiz_with_course(repo, quiz_id).await?;
    require_author(user, &course)?;
    if let Some(title) = &req.title {
        require_text(title, "Quiz title")?;
    }
    check_settings(
        req.passing_score.unwrap_or(quiz.passing_score),
        req.time_limit_minutes.or(quiz.time_limit_minutes),
        req.max_attempts.or(quiz.max_attempts),
    )
    .map_err(ServiceError::BadRequest)?;

    repo.update_quiz(quiz_id, req)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quiz"))
}

/// Quiz settings for anyone who can view the module. Carries no questions or answers.
pub async fn get_quiz_for_module(repo: &dyn Repository, user: &AuthUser, module_id: Uuid) -> ServiceResult<Quiz> {
    let (_, course) = module_with_course(repo, module_id).await?;
    require_view(repo, user, &course).await?;
    repo.get_quiz_by_module(module_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quiz"))
}

/// The authoring tree with correct answers. Authors only.
pub async fn get_quiz_content(repo: &dyn Repository, user: &AuthUser, quiz_id: Uuid) -> ServiceResult<QuizContent> {
    let (_, course) = quiz_with_course(repo, quiz_id).await?;
    require_author(user, &course)?;
    repo.load_quiz_content(quiz_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quiz"))
}

pub async fn add_section(
    repo: &dyn Repository,
    user: &AuthUser,
    quiz_id: Uuid,
    req: CreateSectionRequest,
) -> ServiceResult<QuizSection> {
    let content = get_quiz_content(repo, user, quiz_id).await?;
    require_text(&req.title, "Section title")?;

    let position = req
        .position
        .unwrap_or_else(|| next_position(content.sections.iter().map(|s| s.position)));
    Ok(repo.create_section(quiz_id, req, position).await?)
}

pub async fn add_group(
    repo: &dyn Repository,
    user: &AuthUser,
    section_id: Uuid,
    req: CreateGroupRequest,
) -> ServiceResult<QuizGroup> {
    let (section, course) = section_with_course(repo, section_id).await?;
    require_author(user, &course)?;

    let position = match req.position {
        Some(position) => position,
        None => {
            let content = repo
                .load_quiz_content(section.quiz_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Quiz"))?;
            next_unit_position(&content, section_id)
        }
    };
    Ok(repo.create_group(section_id, req, position).await?)
}

/// Groups and standalone questions share one position sequence inside a section.
fn next_unit_position(content: &QuizContent, section_id: Uuid) -> i32 {
    let groups = content
        .groups
        .iter()
        .filter(|g| g.section_id == section_id)
        .map(|g| g.position);
    let standalone = content
        .questions
        .iter()
        .filter(|q| q.section_id == section_id && q.group_id.is_none())
        .map(|q| q.position);
    next_position(groups.chain(standalone))
}

pub async fn add_question(
    repo: &dyn Repository,
    user: &AuthUser,
    section_id: Uuid,
    req: CreateQuestionRequest,
) -> ServiceResult<Question> {
    let (section, course) = section_with_course(repo, section_id).await?;
    require_author(user, &course)?;
    validate_question(&req).map_err(ServiceError::BadRequest)?;

    let content = repo
        .load_quiz_content(section.quiz_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quiz"))?;

    let position = match (req.group_id, req.position) {
        (_, Some(position)) => position,
        (Some(group_id), None) => next_position(
            content
                .questions
                .iter()
                .filter(|q| q.group_id == Some(group_id))
                .map(|q| q.position),
        ),
        (None, None) => next_unit_position(&content, section_id),
    };

    if let Some(group_id) = req.group_id {
        let group = repo
            .get_group(group_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group"))?;
        if group.section_id != section_id {
            return Err(ServiceError::BadRequest(
                "Group belongs to another section".to_string(),
            ));
        }
    }

    Ok(repo.create_question(section_id, req, position).await?)
}

pub async fn delete_question(repo: &dyn Repository, user: &AuthUser, question_id: Uuid) -> ServiceResult<()> {
    let question = repo
        .get_question(question_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Question"))?;
    let (_, course) = section_with_course(repo, question.section_id).await?;
    require_author(user, &course)?;

    if !repo.delete_question(question_id).await? {
        return Err(ServiceError::not_found("Question"));
    }
    Ok(())
}
