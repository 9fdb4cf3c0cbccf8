use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Notification
///
/// An in-app message for one recipient (`notifications` table).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    // e.g. "vocabulary_reminder", "payment_paid", "essay_graded".
    // Sent as "type" in JSON, stored as "kind".
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}
