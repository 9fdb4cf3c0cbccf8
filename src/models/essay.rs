use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Essay {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub prompt: String,
    pub max_score: f64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateEssayRequest {
    pub title: String,
    pub prompt: String,
    pub max_score: Option<f64>,
}

/// EssaySubmission
///
/// One learner's essay. Ungraded submissions may be replaced; graded ones are final.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EssaySubmission {
    pub id: Uuid,
    pub essay_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by: Option<Uuid>,
    #[ts(type = "string")]
    pub submitted_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub graded_at: Option<DateTime<Utc>>,
}

impl EssaySubmission {
    pub fn is_graded(&self) -> bool {
        self.score.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SubmitEssayRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GradeEssayRequest {
    pub score: f64,
    pub feedback: Option<String>,
}
