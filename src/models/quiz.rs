use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// QuestionType
///
/// Selects the scoring strategy applied to a learner's answer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
    Default,
)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    MultipleAnswers,
    TrueFalse,
    FillInBlank,
    Matching,
    Ordering,
}

/// Quiz
///
/// Settings of a quiz attached to an assessment module (`quizzes` table).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Quiz {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    /// Minimum percentage (0-100) needed to pass.
    pub passing_score: f64,
    pub max_attempts: Option<i32>,
    pub shuffle_questions: bool,
    pub shuffle_answers: bool,
    pub show_answers_after_submit: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct QuizSection {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub title: String,
    pub instructions: Option<String>,
    pub position: i32,
}

/// QuizGroup
///
/// Questions sharing a reading passage or media clip. Shuffled as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct QuizGroup {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: Option<String>,
    pub passage: Option<String>,
    pub media_key: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Question {
    pub id: Uuid,
    pub section_id: Uuid,
    pub group_id: Option<Uuid>,
    pub question_type: QuestionType,
    pub prompt: String,
    pub points: f64,
    pub explanation: Option<String>,
    pub position: i32,
    // Loaded from `answer_options` separately.
    #[sqlx(skip)]
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn correct_option_ids(&self) -> Vec<Uuid> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }
}

/// AnswerOption
///
/// For fill-in-blank questions the correct options are the accepted answers; for
/// matching questions `match_value` holds the right-hand side; for ordering questions
/// `position` is the correct order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AnswerOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub content: String,
    pub is_correct: bool,
    pub match_value: Option<String>,
    pub position: i32,
}

/// QuizContent
///
/// The full authoring tree of a quiz, including correct answers. Only owners see it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct QuizContent {
    pub quiz: Quiz,
    pub sections: Vec<QuizSection>,
    pub groups: Vec<QuizGroup>,
    pub questions: Vec<Question>,
}

impl QuizContent {
    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

fn default_passing_score() -> f64 {
    50.0
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_limit_minutes: Option<i32>,
    #[serde(default = "default_passing_score")]
    pub passing_score: f64,
    pub max_attempts: Option<i32>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_answers: bool,
    #[serde(default)]
    pub show_answers_after_submit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateQuizRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passing_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle_questions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle_answers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_answers_after_submit: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateSectionRequest {
    pub title: String,
    pub instructions: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateGroupRequest {
    pub title: Option<String>,
    pub passage: Option<String>,
    pub media_key: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateOptionRequest {
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
    pub match_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateQuestionRequest {
    pub group_id: Option<Uuid>,
    pub question_type: QuestionType,
    pub prompt: String,
    // Defaults to one point.
    pub points: Option<f64>,
    pub explanation: Option<String>,
    pub position: Option<i32>,
    // Listed in their canonical order; for ordering questions this is the answer.
    pub options: Vec<CreateOptionRequest>,
}
