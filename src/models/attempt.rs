use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::quiz::QuestionType;

/// AttemptStatus
///
/// Lifecycle of a quiz attempt: `Created -> InProgress -> Submitted`, or
/// `InProgress -> AutoSubmitted` once the time limit has passed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AttemptStatus {
    #[default]
    Created,
    InProgress,
    Submitted,
    AutoSubmitted,
}

impl AttemptStatus {
    pub fn is_finalized(&self) -> bool {
        matches!(self, AttemptStatus::Submitted | AttemptStatus::AutoSubmitted)
    }
}

/// AttemptSlot
///
/// One question of an attempt's frozen layout, with the option order shown to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AttemptSlot {
    pub question_id: Uuid,
    pub option_order: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub status: AttemptStatus,
    pub attempt_number: i32,
    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub passed: Option<bool>,
    pub layout: Vec<AttemptSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MatchPair {
    pub option_id: Uuid,
    pub value: String,
}

/// UserAnswer
///
/// A learner's answer, tagged by kind. The kind must fit the question type:
/// `choice` for multiple choice / multiple answers / true-false, `text` for
/// fill-in-blank, `matching` and `ordering` for their namesakes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum UserAnswer {
    Choice { option_ids: Vec<Uuid> },
    Text { text: String },
    Matching { pairs: Vec<MatchPair> },
    Ordering { option_ids: Vec<Uuid> },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuizUserAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub answer: UserAnswer,
    pub is_correct: bool,
    pub points_earned: f64,
    #[ts(type = "string")]
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SaveAnswerRequest {
    pub question_id: Uuid,
    pub answer: UserAnswer,
}

// --- Learner-facing views (no correctness data) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OptionView {
    pub id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuestionView {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub prompt: String,
    pub points: f64,
    pub group_id: Option<Uuid>,
    pub group_passage: Option<String>,
    pub group_media_key: Option<String>,
    pub options: Vec<OptionView>,
    // Right-hand values of a matching question, sorted.
    pub match_choices: Vec<String>,
    pub saved_answer: Option<UserAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SectionView {
    pub id: Uuid,
    pub title: String,
    pub instructions: Option<String>,
    pub questions: Vec<QuestionView>,
}

/// AttemptView
///
/// What a learner sees while taking a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AttemptView {
    pub attempt_id: Uuid,
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub status: AttemptStatus,
    pub attempt_number: i32,
    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AnswerReview {
    pub question_id: Uuid,
    pub answered: bool,
    pub is_correct: bool,
    pub points_earned: f64,
    pub points_possible: f64,
    // Only populated when the quiz reveals answers after submission.
    pub correct_option_ids: Option<Vec<Uuid>>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AttemptResult {
    pub attempt: QuizAttempt,
    pub answers: Vec<AnswerReview>,
}
