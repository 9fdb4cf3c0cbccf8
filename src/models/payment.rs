use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    Failed,
}

/// PaymentPurpose
///
/// What a payment buys: a course enrollment or a teacher subscription period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "payment_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentPurpose {
    #[default]
    Course,
    Subscription,
}

/// Payment
///
/// A PayOS payment link and its settlement state. `target_id` is the course id or the
/// teacher package id depending on `purpose`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_code: i64,
    pub amount: i64,
    pub description: String,
    pub purpose: PaymentPurpose,
    pub target_id: Uuid,
    pub status: PaymentStatus,
    pub checkout_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CheckoutResponse {
    pub order_code: i64,
    pub amount: i64,
    pub checkout_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct TeacherPackage {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub duration_days: i32,
    pub max_courses: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePackageRequest {
    pub name: String,
    pub price: i64,
    pub duration_days: i32,
    pub max_courses: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct TeacherSubscription {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub package_id: Uuid,
    /// The payment that bought this period.
    pub payment_id: Option<Uuid>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
}

impl TeacherSubscription {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}
