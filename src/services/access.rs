//! Row-level access rules: who may read or author a course and everything under it.

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ServiceError, ServiceResult},
    models::{Course, Lesson, Module, Quiz, QuizSection},
    repository::{CourseRepository, QuizRepository, Repository},
};

pub fn can_author(user: &AuthUser, course: &Course) -> bool {
    user.is_admin() || course.owner_id == user.id
}

pub fn require_author(user: &AuthUser, course: &Course) -> ServiceResult<()> {
    if can_author(user, course) {
        Ok(())
    } else {
        Err(ServiceError::forbidden())
    }
}

/// Admins, the owner and enrolled learners may read course content.
pub async fn can_view(repo: &dyn Repository, user: &AuthUser, course: &Course) -> ServiceResult<bool> {
    if can_author(user, course) {
        return Ok(true);
    }
    Ok(repo.is_enrolled(user.id, course.id).await?)
}

pub async fn require_view(repo: &dyn Repository, user: &AuthUser, course: &Course) -> ServiceResult<()> {
    if can_view(repo, user, course).await? {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("Enroll in this course to access its content".to_string()))
    }
}

pub async fn load_course(repo: &dyn Repository, id: Uuid) -> ServiceResult<Course> {
    repo.get_course(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Course"))
}

pub async fn lesson_with_course(repo: &dyn Repository, lesson_id: Uuid) -> ServiceResult<(Lesson, Course)> {
    let lesson = repo
        .get_lesson(lesson_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Lesson"))?;
    let course = load_course(repo, lesson.course_id).await?;
    Ok((lesson, course))
}

pub async fn module_with_course(repo: &dyn Repository, module_id: Uuid) -> ServiceResult<(Module, Course)> {
    let module = repo
        .get_module(module_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Module"))?;
    let (_, course) = lesson_with_course(repo, module.lesson_id).await?;
    Ok((module, course))
}

pub async fn quiz_with_course(repo: &dyn Repository, quiz_id: Uuid) -> ServiceResult<(Quiz, Course)> {
    let quiz = repo
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Quiz"))?;
    let (_, course) = module_with_course(repo, quiz.module_id).await?;
    Ok((quiz, course))
}

pub async fn section_with_course(
    repo: &dyn Repository,
    section_id: Uuid,
) -> ServiceResult<(QuizSection, Course)> {
    let section = repo
        .get_section(section_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Section"))?;
    let (_, course) = quiz_with_course(repo, section.quiz_id).await?;
    Ok((section, course))
}
