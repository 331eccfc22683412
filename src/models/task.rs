use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One completed (user, task type) pair. Points are snapshotted at completion time.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_type: String,
    pub points: i64,
    pub completed_at: DateTime<Utc>,
}

/// Input to the completion transaction, already validated against the catalog.
#[derive(Debug, Clone)]
pub struct NewCompletion {
    pub user_id: Uuid,
    pub task_type: String,
    pub points: i64,
    /// Amount to credit the user's referrer, if this task type pays a referral bonus.
    pub referral_bonus: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CompletionReceipt {
    pub task: Task,
    /// Referrer that actually received the bonus.
    pub credited_referrer: Option<Uuid>,
}
