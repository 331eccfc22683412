//! In-process ledger for isolated tests and local experiments.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{LedgerStore, StoreError};
use crate::models::{
    task::{CompletionReceipt, NewCompletion, Task},
    user::{BalanceRow, User},
};

#[derive(Debug, Clone, Default)]
struct Ledger {
    // Insertion order doubles as creation order for leaderboard ties.
    users: Vec<User>,
    tasks: Vec<Task>,
}

impl Ledger {
    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }
}

/// All state sits behind one lock, so each transaction sees and writes a consistent snapshot.
/// Writes are staged on a copy and swapped in at commit.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<Ledger>,
    fail_next_commit: AtomicBool,
    fail_next_lookup: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger::default()
    }

    pub async fn insert_user(&self, username: &str, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            balance: 0,
            referrer_id: None,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.users.push(user.clone());
        user
    }

    /// Drops a user row, leaving any reference to it dangling.
    pub async fn delete_user(&self, user_id: Uuid) {
        self.state.lock().await.users.retain(|u| u.id != user_id);
    }

    /// Makes the next completion transaction fail at commit time.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next existence check fail as if the connection dropped.
    pub fn fail_next_lookup(&self) {
        self.fail_next_lookup.store(true, Ordering::SeqCst);
    }

    pub async fn task_count(&self, user_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.user(user_id).cloned())
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        if self.fail_next_lookup.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.state.lock().await.user(user_id).is_some())
    }

    async fn has_completed(&self, user_id: Uuid, task_type: &str) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .tasks
            .iter()
            .any(|t| t.user_id == user_id && t.task_type == task_type))
    }

    async fn record_completion(
        &self,
        completion: NewCompletion,
    ) -> Result<CompletionReceipt, StoreError> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();
        let now = Utc::now();

        if staged.user(completion.user_id).is_none() {
            return Err(StoreError::UserMissing(completion.user_id));
        }
        if staged
            .tasks
            .iter()
            .any(|t| t.user_id == completion.user_id && t.task_type == completion.task_type)
        {
            return Err(StoreError::DuplicateTask);
        }

        let task = Task {
            id: Uuid::new_v4(),
            user_id: completion.user_id,
            task_type: completion.task_type.clone(),
            points: completion.points,
            completed_at: now,
        };
        staged.tasks.push(task.clone());

        let referrer = {
            let user = staged
                .user_mut(completion.user_id)
                .ok_or(StoreError::UserMissing(completion.user_id))?;
            user.balance += completion.points;
            user.updated_at = now;
            user.referrer_id
        };

        let mut credited_referrer = None;
        if let (Some(bonus), Some(referrer_id)) = (completion.referral_bonus, referrer) {
            match staged.user_mut(referrer_id) {
                Some(referrer) => {
                    referrer.balance += bonus;
                    referrer.updated_at = now;
                    credited_referrer = Some(referrer_id);
                }
                None => {
                    tracing::warn!(user_id = %completion.user_id, %referrer_id, "referrer row missing, bonus skipped");
                }
            }
        }

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        *state = staged;
        Ok(CompletionReceipt {
            task,
            credited_referrer,
        })
    }

    async fn assign_referrer(&self, user_id: Uuid, referrer_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let user = state
            .user_mut(user_id)
            .ok_or(StoreError::UserMissing(user_id))?;
        if user.referrer_id.is_some() {
            return Ok(false);
        }
        user.referrer_id = Some(referrer_id);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(tasks)
    }

    async fn top_balances(&self, limit: i64) -> Result<Vec<BalanceRow>, StoreError> {
        let state = self.state.lock().await;
        let mut users: Vec<&User> = state.users.iter().collect();
        users.sort_by(|a, b| b.balance.cmp(&a.balance));
        Ok(users
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|u| BalanceRow {
                user_id: u.id,
                username: u.username.clone(),
                balance: u.balance,
            })
            .collect())
    }
}
