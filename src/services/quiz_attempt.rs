//! Taking quizzes: starting or resuming attempts, saving answers, submitting, and
//! finalizing attempts whose time limit has passed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    access::{quiz_with_course, require_author, require_view},
    progress::record_activity,
};
use crate::{
    auth::AuthUser,
    error::{ServiceError, ServiceResult},
    models::{
        AttemptResult, AttemptStatus, AttemptView, QuizAttempt, QuizContent, QuizUserAnswer,
        SaveAnswerRequest,
    },
    quiz::{
        AttemptEvent,
        attempt::{aggregate_score, begin_attempt, is_expired, submit_event, transition},
        layout::build_layout,
        mapper::{to_attempt_result, to_attempt_view},
        score_answer,
    },
    repository::{QuizRepository, Repository},
};

async fn load_content(repo: &dyn Repository, quiz_id: Uuid) -> ServiceResult<QuizContent> {
    repo.load_quiz_content(quiz_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quiz"))
}

async fn owned_attempt(repo: &dyn Repository, user: &AuthUser, attempt_id: Uuid) -> ServiceResult<QuizAttempt> {
    let attempt = repo
        .get_attempt(attempt_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Attempt"))?;
    if attempt.user_id != user.id {
        return Err(ServiceError::forbidden());
    }
    Ok(attempt)
}

/// finalize
///
/// Scores the saved answers and moves the attempt out of `InProgress`. The repository
/// applies the change only if the row is still in progress; `None` means another
/// request finalized it first.
async fn finalize(
    repo: &dyn Repository,
    content: &QuizContent,
    attempt: &QuizAttempt,
    event: AttemptEvent,
    now: DateTime<Utc>,
) -> ServiceResult<Option<QuizAttempt>> {
    let status = transition(attempt.status, event)
        .map_err(|e| ServiceError::Conflict(e.to_string()))?;
    let answers = repo.list_answers(attempt.id).await?;
    let score = aggregate_score(content, &attempt.layout, &answers);

    let finalized = repo.finalize_attempt(attempt.id, status, &score, now).await?;
    if let Some(done) = &finalized {
        tracing::info!(
            attempt_id = %done.id,
            status = ?done.status,
            score = done.score,
            max_score = done.max_score,
            "quiz attempt finalized"
        );
    }
    Ok(finalized)
}

/// start_attempt
///
/// Resumes the learner's running attempt if it is still within its time limit.
/// An expired running attempt is auto-submitted first and counts towards `max_attempts`.
pub async fn start_attempt(
    repo: &dyn Repository,
    user: &AuthUser,
    quiz_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<AttemptView> {
    let (_, course) = quiz_with_course(repo, quiz_id).await?;
    require_view(repo, user, &course).await?;
    let content = load_content(repo, quiz_id).await?;

    if let Some(running) = repo.find_in_progress_attempt(user.id, quiz_id).await? {
        if !is_expired(&running, now) {
            let answers = repo.list_answers(running.id).await?;
            return Ok(to_attempt_view(&content, &running, &answers, now));
        }
        finalize(repo, &content, &running, AttemptEvent::Expire, now).await?;
    }

    let previous = repo.count_attempts(user.id, quiz_id).await?;
    if let Some(max) = content.quiz.max_attempts {
        if previous >= i64::from(max) {
            return Err(ServiceError::Conflict(format!(
                "Maximum number of attempts ({}) reached",
                max
            )));
        }
    }
    if content.questions.is_empty() {
        return Err(ServiceError::BadRequest("This quiz has no questions yet".to_string()));
    }

    let layout = {
        let mut rng = rand::rng();
        build_layout(&content, &mut rng)
    };
    let attempt = begin_attempt(&content.quiz, user.id, previous as i32 + 1, layout, now)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    repo.create_attempt(&attempt).await?;
    tracing::info!(attempt_id = %attempt.id, quiz_id = %quiz_id, user_id = %user.id, "quiz attempt started");

    Ok(to_attempt_view(&content, &attempt, &[], now))
}

/// save_answer
///
/// Scores the answer immediately and stores it, replacing an earlier answer to the
/// same question. Saving into an expired attempt finalizes it and fails with 409.
pub async fn save_answer(
    repo: &dyn Repository,
    user: &AuthUser,
    attempt_id: Uuid,
    req: SaveAnswerRequest,
    now: DateTime<Utc>,
) -> ServiceResult<QuizUserAnswer> {
    let attempt = owned_attempt(repo, user, attempt_id).await?;
    if attempt.status != AttemptStatus::InProgress {
        return Err(ServiceError::Conflict("Attempt is no longer in progress".to_string()));
    }

    let content = load_content(repo, attempt.quiz_id).await?;
    if is_expired(&attempt, now) {
        finalize(repo, &content, &attempt, AttemptEvent::Expire, now).await?;
        return Err(ServiceError::Conflict(
            "Time limit exceeded; the attempt was submitted automatically".to_string(),
        ));
    }

    if !attempt.layout.iter().any(|slot| slot.question_id == req.question_id) {
        return Err(ServiceError::BadRequest("Question is not part of this attempt".to_string()));
    }
    let question = content
        .question(req.question_id)
        .ok_or_else(|| ServiceError::not_found("Question"))?;
    let score = score_answer(question, &req.answer).map_err(|e| ServiceError::BadRequest(e.to_string()))?;

    let answer = QuizUserAnswer {
        id: Uuid::new_v4(),
        attempt_id,
        question_id: req.question_id,
        answer: req.answer,
        is_correct: score.is_correct,
        points_earned: score.points_earned,
        answered_at: now,
    };
    Ok(repo.upsert_answer(&answer).await?)
}

/// submit
///
/// Finalizes the attempt and returns its result. Past the deadline plus the grace
/// window the attempt is recorded as auto-submitted.
pub async fn submit(
    repo: &dyn Repository,
    user: &AuthUser,
    attempt_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<AttemptResult> {
    let attempt = owned_attempt(repo, user, attempt_id).await?;
    if attempt.status != AttemptStatus::InProgress {
        return Err(ServiceError::Conflict("Attempt has already been submitted".to_string()));
    }

    let content = load_content(repo, attempt.quiz_id).await?;
    let event = submit_event(&attempt, now);
    let finalized = finalize(repo, &content, &attempt, event, now)
        .await?
        .ok_or_else(|| ServiceError::Conflict("Attempt has already been submitted".to_string()))?;

    if event == AttemptEvent::Submit {
        record_activity(repo, user.id, now).await?;
    }

    let answers = repo.list_answers(attempt_id).await?;
    Ok(to_attempt_result(&content, finalized, &answers))
}

/// auto_submit_expired
///
/// Finalizes every running attempt past its deadline. One failing attempt does not
/// stop the sweep. Returns how many attempts were finalized.
pub async fn auto_submit_expired(repo: &dyn Repository, now: DateTime<Utc>) -> ServiceResult<usize> {
    let expired = repo.list_expired_attempts(now).await?;
    let mut contents: HashMap<Uuid, QuizContent> = HashMap::new();
    let mut finalized = 0;

    for attempt in expired {
        if !contents.contains_key(&attempt.quiz_id) {
            match repo.load_quiz_content(attempt.quiz_id).await {
                Ok(Some(content)) => {
                    contents.insert(attempt.quiz_id, content);
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(quiz_id = %attempt.quiz_id, "failed to load quiz for sweep: {:?}", e);
                    continue;
                }
            }
        }
        let Some(content) = contents.get(&attempt.quiz_id) else {
            continue;
        };

        match finalize(repo, content, &attempt, AttemptEvent::Expire, now).await {
            Ok(Some(_)) => finalized += 1,
            Ok(None) => {}
            Err(e) => tracing::error!(attempt_id = %attempt.id, "auto-submit failed: {}", e),
        }
    }
    Ok(finalized)
}

/// The learner's view of a running or finished attempt. An attempt found expired is
/// finalized before it is rendered.
pub async fn get_attempt_view(
    repo: &dyn Repository,
    user: &AuthUser,
    attempt_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<AttemptView> {
    let mut attempt = owned_attempt(repo, user, attempt_id).await?;
    let content = load_content(repo, attempt.quiz_id).await?;

    if attempt.status == AttemptStatus::InProgress && is_expired(&attempt, now) {
        if let Some(done) = finalize(repo, &content, &attempt, AttemptEvent::Expire, now).await? {
            attempt = done;
        }
    }
    let answers = repo.list_answers(attempt_id).await?;
    Ok(to_attempt_view(&content, &attempt, &answers, now))
}

/// Result of a finalized attempt, for the learner or the course's authors.
pub async fn get_attempt_result(repo: &dyn Repository, user: &AuthUser, attempt_id: Uuid) -> ServiceResult<AttemptResult> {
    let attempt = repo
        .get_attempt(attempt_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Attempt"))?;
    if attempt.user_id != user.id {
        let (_, course) = quiz_with_course(repo, attempt.quiz_id).await?;
        require_author(user, &course)?;
    }
    if !attempt.status.is_finalized() {
        return Err(ServiceError::Conflict("Attempt has not been submitted yet".to_string()));
    }

    let content = load_content(repo, attempt.quiz_id).await?;
    let answers = repo.list_answers(attempt_id).await?;
    Ok(to_attempt_result(&content, attempt, &answers))
}

pub async fn list_attempts(repo: &dyn Repository, user: &AuthUser, quiz_id: Uuid) -> ServiceResult<Vec<QuizAttempt>> {
    let (_, course) = quiz_with_course(repo, quiz_id).await?;
    require_view(repo, user, &course).await?;
    Ok(repo.list_attempts(user.id, quiz_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AssessmentKind, ContentType, CourseType, CreateCourseRequest, CreateLessonRequest,
        CreateModuleRequest, CreateOptionRequest, CreateQuestionRequest, CreateQuizRequest,
        CreateSectionRequest, Question, QuestionType, Role, UserAnswer,
    };
    use crate::repository::{CourseRepository, InMemoryRepository};
    use chrono::Duration;

    struct Fixture {
        repo: InMemoryRepository,
        learner: AuthUser,
        quiz_id: Uuid,
        questions: Vec<Question>,
    }

    fn option(content: &str, is_correct: bool) -> CreateOptionRequest {
        CreateOptionRequest { content: content.into(), is_correct, match_value: None }
    }

    async fn fixture(time_limit: Option<i32>, max_attempts: Option<i32>) -> Fixture {
        let repo = InMemoryRepository::new();
        let owner = Uuid::new_v4();
        let course = repo
            .create_course(owner, CourseType::System, CreateCourseRequest { title: "C".into(), ..Default::default() })
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
                    title: "Q".into(),
                    content_type: ContentType::Assessment,
                    assessment_kind: Some(AssessmentKind::Quiz),
                    ..Default::default()
                },
                1,
            )
            .await
            .unwrap();
        let quiz = repo
            .create_quiz(
                module.id,
                CreateQuizRequest {
                    title: "Unit test".into(),
                    description: String::new(),
                    time_limit_minutes: time_limit,
                    passing_score: 50.0,
                    max_attempts,
                    shuffle_questions: false,
                    shuffle_answers: false,
                    show_answers_after_submit: true,
                },
            )
            .await
            .unwrap();
        let section = repo
            .create_section(quiz.id, CreateSectionRequest { title: "S".into(), ..Default::default() }, 1)
            .await
            .unwrap();

        let mut questions = Vec::new();
        for (i, prompt) in ["2 + 2?", "Capital of Vietnam?"].iter().enumerate() {
            let q = repo
                .create_question(
                    section.id,
                    CreateQuestionRequest {
                        question_type: QuestionType::MultipleChoice,
                        prompt: prompt.to_string(),
                        options: vec![option("right", true), option("wrong", false)],
                        ..Default::default()
                    },
                    i as i32 + 1,
                )
                .await
                .unwrap();
            questions.push(q);
        }

        let learner = AuthUser { id: Uuid::new_v4(), roles: vec![Role::Student] };
        repo.enroll(learner.id, course.id).await.unwrap();
        Fixture { repo, learner, quiz_id: quiz.id, questions }
    }

    fn choose(question: &Question, correct: bool) -> SaveAnswerRequest {
        let option = question.options.iter().find(|o| o.is_correct == correct).unwrap();
        SaveAnswerRequest {
            question_id: question.id,
            answer: UserAnswer::Choice { option_ids: vec![option.id] },
        }
    }

    #[tokio::test]
    async fn full_attempt_flow_scores_and_passes() {
        let f = fixture(None, None).await;
        let now = Utc::now();

        let view = start_attempt(&f.repo, &f.learner, f.quiz_id, now).await.unwrap();
        assert_eq!(view.attempt_number, 1);
        assert_eq!(view.sections[0].questions.len(), 2);

        save_answer(&f.repo, &f.learner, view.attempt_id, choose(&f.questions[0], true), now)
            .await
            .unwrap();
        // Later saves replace earlier ones.
        save_answer(&f.repo, &f.learner, view.attempt_id, choose(&f.questions[1], true), now)
            .await
            .unwrap();
        save_answer(&f.repo, &f.learner, view.attempt_id, choose(&f.questions[1], false), now)
            .await
            .unwrap();

        let result = submit(&f.repo, &f.learner, view.attempt_id, now).await.unwrap();
        assert_eq!(result.attempt.status, AttemptStatus::Submitted);
        assert_eq!(result.attempt.score, 1.0);
        assert_eq!(result.attempt.max_score, 2.0);
        assert_eq!(result.attempt.percentage, 50.0);
        assert_eq!(result.attempt.passed, Some(true));
        assert!(result.answers[0].correct_option_ids.is_some());

        assert!(matches!(
            submit(&f.repo, &f.learner, view.attempt_id, now).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn running_attempt_is_resumed_and_limits_are_enforced() {
        let f = fixture(None, Some(1)).await;
        let now = Utc::now();

        let first = start_attempt(&f.repo, &f.learner, f.quiz_id, now).await.unwrap();
        let again = start_attempt(&f.repo, &f.learner, f.quiz_id, now).await.unwrap();
        assert_eq!(first.attempt_id, again.attempt_id);

        submit(&f.repo, &f.learner, first.attempt_id, now).await.unwrap();
        assert!(matches!(
            start_attempt(&f.repo, &f.learner, f.quiz_id, now).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn expired_attempts_reject_answers_and_are_swept() {
        let f = fixture(Some(10), None).await;
        let now = Utc::now();
        let view = start_attempt(&f.repo, &f.learner, f.quiz_id, now).await.unwrap();
        save_answer(&f.repo, &f.learner, view.attempt_id, choose(&f.questions[0], true), now)
            .await
            .unwrap();

        let late = now + Duration::minutes(11);
        assert!(matches!(
            save_answer(&f.repo, &f.learner, view.attempt_id, choose(&f.questions[1], true), late).await,
            Err(ServiceError::Conflict(_))
        ));
        let attempt = f.repo.get_attempt(view.attempt_id).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::AutoSubmitted);
        assert_eq!(attempt.score, 1.0);

        // A second attempt left running is picked up by the sweep.
        let second = start_attempt(&f.repo, &f.learner, f.quiz_id, late).await.unwrap();
        assert_eq!(second.attempt_number, 2);
        assert_eq!(auto_submit_expired(&f.repo, late + Duration::minutes(5)).await.unwrap(), 0);
        assert_eq!(auto_submit_expired(&f.repo, late + Duration::minutes(10)).await.unwrap(), 1);
        assert_eq!(auto_submit_expired(&f.repo, late + Duration::minutes(10)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn outsiders_cannot_start_or_touch_attempts() {
        let f = fixture(None, None).await;
        let now = Utc::now();
        let stranger = AuthUser { id: Uuid::new_v4(), roles: vec![Role::Student] };

        assert!(matches!(
            start_attempt(&f.repo, &stranger, f.quiz_id, now).await,
            Err(ServiceError::Forbidden(_))
        ));

        let view = start_attempt(&f.repo, &f.learner, f.quiz_id, now).await.unwrap();
        assert!(matches!(
            save_answer(&f.repo, &stranger, view.attempt_id, choose(&f.questions[0], true), now).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            get_attempt_result(&f.repo, &f.learner, view.attempt_id).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn mismatched_answer_kinds_are_bad_requests() {
        let f = fixture(None, None).await;
        let now = Utc::now();
        let view = start_attempt(&f.repo, &f.learner, f.quiz_id, now).await.unwrap();

        let req = SaveAnswerRequest {
            question_id: f.questions[0].id,
            answer: UserAnswer::Text { text: "right".into() },
        };
        assert!(matches!(
            save_answer(&f.repo, &f.learner, view.attempt_id, req, now).await,
            Err(ServiceError::BadRequest(_))
        ));

        let foreign = SaveAnswerRequest { question_id: Uuid::new_v4(), ..choose(&f.questions[0], true) };
        assert!(matches!(
            save_answer(&f.repo, &f.learner, view.attempt_id, foreign, now).await,
            Err(ServiceError::BadRequest(_))
        ));
    }
}
