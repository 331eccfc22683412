use std::sync::Arc;

use crate::{
    db::LedgerStore,
    error::ServiceError,
    models::user::{LeaderboardEntry, UserStatus},
};

use super::parse_user_id;

pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

/// Any limit that is absent, unparsable or outside `1..=100` becomes the default.
pub fn leaderboard_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.parse::<i64>().ok())
        .filter(|limit| (1..=MAX_LEADERBOARD_LIMIT).contains(limit))
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
}

/// Read-only views over the ledger.
#[derive(Clone)]
pub struct StatusService {
    store: Arc<dyn LedgerStore>,
}

impl StatusService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        StatusService { store }
    }

    /// `total_points` is summed from the task history, not read from the balance,
    /// so referral bonuses show up in the balance only.
    pub async fn user_status(&self, user_id: &str) -> Result<UserStatus, ServiceError> {
        let user_id = parse_user_id(user_id)?;

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let completed_tasks = self.store.tasks_for_user(user_id).await?;
        let total_points = completed_tasks.iter().map(|t| t.points).sum();

        Ok(UserStatus {
            user,
            completed_tasks,
            total_points,
        })
    }

    /// Top balances with 1-based ranks by output position.
    pub async fn leaderboard(&self, limit: Option<&str>) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let rows = self.store.top_balances(leaderboard_limit(limit)).await?;

        Ok(rows
            .into_iter()
            .zip(1..)
            .map(|(row, rank)| LeaderboardEntry {
                user_id: row.user_id,
                username: row.username,
                balance: row.balance,
                rank,
            })
            .collect())
    }
}
