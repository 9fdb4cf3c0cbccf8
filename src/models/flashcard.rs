use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct FlashCard {
    pub id: Uuid,
    pub module_id: Uuid,
    pub front: String,
    pub back: String,
    pub example: Option<String>,
    pub image_key: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateFlashCardRequest {
    pub front: String,
    pub back: String,
    pub example: Option<String>,
    pub image_key: Option<String>,
}

/// FlashCardReview
///
/// Per-user SM-2 scheduling state of a card (`flashcard_reviews` table).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct FlashCardReview {
    pub user_id: Uuid,
    pub flashcard_id: Uuid,
    pub ease_factor: f64,
    pub interval_days: i32,
    pub repetitions: i32,
    #[ts(type = "string")]
    pub next_review_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub last_reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReviewRequest {
    /// Recall quality from 0 (blackout) to 5 (perfect).
    #[schema(example = 4)]
    pub quality: i32,
}

/// DueFlashCard
///
/// A card waiting for review. `next_review_at` is `None` for cards never reviewed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct DueFlashCard {
    #[sqlx(flatten)]
    pub card: FlashCard,
    #[ts(type = "string | null")]
    pub next_review_at: Option<DateTime<Utc>>,
    pub repetitions: Option<i32>,
}
