use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// AdminDashboardStats
///
/// Output schema for the administrative statistics dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_courses: i64,
    pub total_enrollments: i64,
    pub total_attempts: i64,
    /// Sum of paid payment amounts, in VND.
    pub total_revenue: i64,
    pub pending_payments: i64,
}
