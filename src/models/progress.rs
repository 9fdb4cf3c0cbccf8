use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// UserStreak
///
/// Consecutive-day learning streak (`user_streaks` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserStreak {
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    #[ts(type = "string | null")]
    pub last_activity_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LessonProgress {
    pub lesson_id: Uuid,
    pub completed_modules: i64,
    pub total_modules: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseProgress {
    pub course_id: Uuid,
    pub completed_lessons: i64,
    pub total_lessons: i64,
    pub percentage: f64,
    pub lessons: Vec<LessonProgress>,
}
