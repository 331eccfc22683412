use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::task::Task;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile, completion history (newest first) and the points summed from that history.
#[derive(Debug, Serialize)]
pub struct UserStatus {
    pub user: User,
    pub completed_tasks: Vec<Task>,
    pub total_points: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BalanceRow {
    pub user_id: Uuid,
    pub username: String,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub username: String,
    pub balance: i64,
    pub rank: u32,
}
