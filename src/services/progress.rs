//! Module completion, lesson/course percentages and the daily learning streak.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::access::{load_course, module_with_course, require_view};
use crate::{
    auth::AuthUser,
    error::ServiceResult,
    models::{CourseProgress, Lesson, LessonProgress, Module, UserStreak},
    repository::Repository,
};

fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

/// compute_course_progress
///
/// A lesson is complete when it has at least one module and all of them are done.
/// The course percentage counts complete lessons, not modules.
pub fn compute_course_progress(
    course_id: Uuid,
    lessons: &[Lesson],
    modules: &[Module],
    completed: &HashSet<Uuid>,
) -> CourseProgress {
    let lessons: Vec<LessonProgress> = lessons
        .iter()
        .map(|lesson| {
            let in_lesson: Vec<&Module> = modules.iter().filter(|m| m.lesson_id == lesson.id).collect();
            let total = in_lesson.len() as i64;
            let done = in_lesson.iter().filter(|m| completed.contains(&m.id)).count() as i64;
            LessonProgress {
                lesson_id: lesson.id,
                completed_modules: done,
                total_modules: total,
                percentage: percentage(done, total),
            }
        })
        .collect();

    let total_lessons = lessons.len() as i64;
    let completed_lessons = lessons
        .iter()
        .filter(|l| l.total_modules > 0 && l.completed_modules == l.total_modules)
        .count() as i64;

    CourseProgress {
        course_id,
        completed_lessons,
        total_lessons,
        percentage: percentage(completed_lessons, total_lessons),
        lessons,
    }
}

/// next_streak
///
/// Same day keeps the streak, the following day extends it, anything else restarts at 1.
pub fn next_streak(previous: Option<&UserStreak>, user_id: Uuid, today: NaiveDate) -> UserStreak {
    let Some(prev) = previous else {
        return UserStreak {
            user_id,
            current_streak: 1,
            longest_streak: 1,
            last_activity_date: Some(today),
        };
    };

    let current = match prev.last_activity_date {
        Some(last) if last == today => return prev.clone(),
        Some(last) if last.succ_opt() == Some(today) => prev.current_streak + 1,
        _ => 1,
    };

    UserStreak {
        user_id,
        current_streak: current,
        longest_streak: prev.longest_streak.max(current),
        last_activity_date: Some(today),
    }
}

/// Records learning activity for the user's streak on the UTC day of `now`.
pub async fn record_activity(repo: &dyn Repository, user_id: Uuid, now: DateTime<Utc>) -> ServiceResult<UserStreak> {
    let previous = repo.get_streak(user_id).await?;
    let streak = next_streak(previous.as_ref(), user_id, now.date_naive());
    if previous.as_ref() != Some(&streak) {
        repo.save_streak(&streak).await?;
    }
    Ok(streak)
}

pub async fn get_streak(repo: &dyn Repository, user_id: Uuid) -> ServiceResult<UserStreak> {
    Ok(repo.get_streak(user_id).await?.unwrap_or(UserStreak { user_id, ..UserStreak::default() }))
}

pub async fn course_progress(repo: &dyn Repository, user: &AuthUser, course_id: Uuid) -> ServiceResult<CourseProgress> {
    let course = load_course(repo, course_id).await?;
    require_view(repo, user, &course).await?;

    let lessons = repo.list_lessons(course_id).await?;
    let modules = repo.list_course_modules(course_id).await?;
    let completed: HashSet<Uuid> = repo
        .completed_module_ids(user.id, course_id)
        .await?
        .into_iter()
        .collect();
    Ok(compute_course_progress(course_id, &lessons, &modules, &completed))
}

/// complete_module
///
/// Idempotent. Returns the refreshed progress of the enclosing course.
pub async fn complete_module(
    repo: &dyn Repository,
    user: &AuthUser,
    module_id: Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<CourseProgress> {
    let (_, course) = module_with_course(repo, module_id).await?;
    require_view(repo, user, &course).await?;

    if repo.mark_module_complete(user.id, module_id).await? {
        record_activity(repo, user.id, now).await?;
    }
    course_progress(repo, user, course.id).await
}
