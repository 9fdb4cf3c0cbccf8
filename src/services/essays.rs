//! Essay assessments: authoring, learner submissions and manual grading.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    access::{module_with_course, require_author, require_view},
    notifications::notify,
    progress::record_activity,
    quiz_authoring::ensure_module_kind,
    require_text,
};
use crate::{
    auth::AuthUser,
    error::{ServiceError, ServiceResult},
    models::{
        AssessmentKind, Course, CreateEssayRequest, Essay, EssaySubmission, GradeEssayRequest,
        SubmitEssayRequest,
    },
    repository::{EssayRepository, Repository},
};

pub const DEFAULT_MAX_SCORE: f64 = 10.0;

async fn essay_with_course(repo: &dyn Repository, essay_id: Uuid) -> ServiceResult<(Essay, Course)> {
    let essay = repo
        .get_essay(essay_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Essay"))?;
    let (_, course) = module_with_course(repo, essay.module_id).await?;
    Ok((essay, course))
}

pub async fn create_essay(
    repo: &dyn Repository,
    user: &AuthUser,
    module_id: Uuid,
    req: CreateEssayRequest,
) -> ServiceResult<Essay> {
    let (module, course) = module_with_course(repo, module_id).await?;
    require_author(user, &course)?;
    ensure_module_kind(&module, AssessmentKind::Essay)?;
    require_text(&req.title, "Title")?;
    require_text(&req.prompt, "Prompt")?;
    if req.max_score.is_some_and(|s| s <= 0.0) {
        return Err(ServiceError::BadRequest("Max score must be positive".to_string()));
    }
    if repo.get_essay_by_module(module_id).await?.is_some() {
        return Err(ServiceError::Conflict("This module already has an essay".to_string()));
    }
    Ok(repo.create_essay(module_id, req).await?)
}

pub async fn get_essay_for_module(repo: &dyn Repository, user: &AuthUser, module_id: Uuid) -> ServiceResult<Essay> {
    let (_, course) = module_with_course(repo, module_id).await?;
    require_view(repo, user, &course).await?;
    repo.get_essay_by_module(module_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Essay"))
}

/// submit_essay
///
/// Creates or replaces the learner's submission. Graded submissions are final.
pub async fn submit_essay(
    repo: &dyn Repository,
    user: &AuthUser,
    essay_id: Uuid,
    req: SubmitEssayRequest,
    now: DateTime<Utc>,
) -> ServiceResult<EssaySubmission> {
    let (essay, course) = essay_with_course(repo, essay_id).await?;
    require_view(repo, user, &course).await?;
    require_text(&req.content, "Content")?;

    let submission = repo
        .upsert_submission(essay.id, user.id, req.content, now)
        .await?
        .ok_or_else(|| ServiceError::Conflict("This essay has already been graded".to_string()))?;
    record_activity(repo, user.id, now).await?;
    Ok(submission)
}

pub async fn my_submission(repo: &dyn Repository, user: &AuthUser, essay_id: Uuid) -> ServiceResult<EssaySubmission> {
    let (essay, course) = essay_with_course(repo, essay_id).await?;
    require_view(repo, user, &course).await?;
    repo.get_user_submission(essay.id, user.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Submission"))
}

pub async fn list_submissions(
    repo: &dyn Repository,
    user: &AuthUser,
    essay_id: Uuid,
) -> ServiceResult<Vec<EssaySubmission>> {
    let (essay, course) = essay_with_course(repo, essay_id).await?;
    require_author(user, &course)?;
    Ok(repo.list_submissions(essay.id).await?)
}

/// grade_submission
///
/// Authors grade within `0..=max_score`. The learner is notified.
pub async fn grade_submission(
    repo: &dyn Repository,
    user: &AuthUser,
    submission_id: Uuid,
    req: GradeEssayRequest,
    now: DateTime<Utc>,
) -> ServiceResult<EssaySubmission> {
    let submission = repo
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Submission"))?;
    let (essay, course) = essay_with_course(repo, submission.essay_id).await?;
    require_author(user, &course)?;

    if !(0.0..=essay.max_score).contains(&req.score) {
        return Err(ServiceError::BadRequest(format!(
            "Score must be between 0 and {}",
            essay.max_score
        )));
    }

    let graded = repo
        .grade_submission(submission_id, req.score, req.feedback, user.id, now)
        .await?
        .ok_or_else(|| ServiceError::not_found("Submission"))?;

    notify(
        repo,
        graded.user_id,
        "essay_graded",
        &format!("Your essay \"{}\" was graded: {}/{}", essay.title, req.score, essay.max_score),
    )
    .await;
    Ok(graded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContentType, CourseType, CreateCourseRequest, CreateLessonRequest, CreateModuleRequest, Role,
    };
    use crate::repository::{CourseRepository, InMemoryRepository, NotificationRepository};

    #[tokio::test]
    async fn submit_grade_and_lock() {
        let repo = InMemoryRepository::new();
        let owner = AuthUser { id: Uuid::new_v4(), roles: vec![Role::Teacher] };
        let learner = AuthUser { id: Uuid::new_v4(), roles: vec![Role::Student] };
        let now = Utc::now();

        let course = repo
            .create_course(owner.id, CourseType::Teacher, CreateCourseRequest { title: "Writing".into(), ..Default::default() })
            .await
            .unwrap();
        let lesson = repo
            .create_lesson(course.id, CreateLessonRequest { title: "L".into(), ..Default::default() }, 1)
            .await
            .unwrap();
        let module = repo
            .create_module(
                lesson.id,
                CreateModuleRequest {
                    title: "Essay".into(),
                    content_type: ContentType::Assessment,
                    assessment_kind: Some(AssessmentKind::Essay),
                    ..Default::default()
                },
                1,
            )
            .await
            .unwrap();

        let essay = create_essay(
            &repo,
            &owner,
            module.id,
            CreateEssayRequest { title: "My hometown".into(), prompt: "Describe it.".into(), max_score: None },
        )
        .await
        .unwrap();
        assert_eq!(essay.max_score, DEFAULT_MAX_SCORE);

        let req = || SubmitEssayRequest { content: "It is by the river.".into() };
        assert!(matches!(
            submit_essay(&repo, &learner, essay.id, req(), now).await,
            Err(ServiceError::Forbidden(_))
        ));

        repo.enroll(learner.id, course.id).await.unwrap();
        let first = submit_essay(&repo, &learner, essay.id, req(), now).await.unwrap();
        let second = submit_essay(&repo, &learner, essay.id, req(), now).await.unwrap();
        assert_eq!(first.id, second.id);

        assert!(matches!(
            grade_submission(&repo, &owner, first.id, GradeEssayRequest { score: 11.0, feedback: None }, now).await,
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            grade_submission(&repo, &learner, first.id, GradeEssayRequest { score: 5.0, feedback: None }, now).await,
            Err(ServiceError::Forbidden(_))
        ));

        let graded = grade_submission(
            &repo,
            &owner,
            first.id,
            GradeEssayRequest { score: 8.5, feedback: Some("Good flow".into()) },
            now,
        )
        .await
        .unwrap();
        assert_eq!(graded.score, Some(8.5));
        assert_eq!(graded.graded_by, Some(owner.id));

        assert!(matches!(
            submit_essay(&repo, &learner, essay.id, req(), now).await,
            Err(ServiceError::Conflict(_))
        ));

        let notes = repo.list_notifications(learner.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, "essay_graded");
    }
}
