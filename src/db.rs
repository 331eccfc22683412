use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Connection, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    task::{CompletionReceipt, NewCompletion, Task},
    user::{BalanceRow, User},
};

pub mod memory;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task already completed")]
    DuplicateTask,

    #[error("user {0} does not exist")]
    UserMissing(Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Durable storage for users, completion records and balances.
///
/// Implementations own the atomicity of [`LedgerStore::record_completion`]:
/// the task row, the balance credit and the referral bonus commit together or not at all,
/// and two concurrent completions of the same (user, task type) never both succeed.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError>;

    async fn has_completed(&self, user_id: Uuid, task_type: &str) -> Result<bool, StoreError>;

    async fn record_completion(
        &self,
        completion: NewCompletion,
    ) -> Result<CompletionReceipt, StoreError>;

    /// Sets the referrer only if none is set yet. Returns `false` when a referrer already existed.
    async fn assign_referrer(&self, user_id: Uuid, referrer_id: Uuid) -> Result<bool, StoreError>;

    /// Completion records for a user, most recent first.
    async fn tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// Users by descending balance, ties in creation order.
    async fn top_balances(&self, limit: i64) -> Result<Vec<BalanceRow>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        PgLedger { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(PgLedger::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    // Runs inside a savepoint: a failure here rolls back the bonus only.
    async fn credit_referrer(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        bonus: i64,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let mut savepoint = tx.begin().await?;

        let referrer: Option<Uuid> =
            sqlx::query_scalar("SELECT referrer_id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&mut *savepoint)
                .await?;

        let Some(referrer_id) = referrer else {
            return Ok(None);
        };

        let credited = sqlx::query(
            "UPDATE users SET balance = balance + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(bonus)
        .bind(referrer_id)
        .execute(&mut *savepoint)
        .await?;

        if credited.rows_affected() == 0 {
            tracing::warn!(%user_id, %referrer_id, "referrer row missing, bonus skipped");
            return Ok(None);
        }

        savepoint.commit().await?;
        Ok(Some(referrer_id))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, balance, referrer_id, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn has_completed(&self, user_id: Uuid, task_type: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE user_id = $1 AND task_type = $2)",
        )
        .bind(user_id)
        .bind(task_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn record_completion(
        &self,
        completion: NewCompletion,
    ) -> Result<CompletionReceipt, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes completions for the same user until commit.
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(completion.user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::UserMissing(completion.user_id));
        }

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE user_id = $1 AND task_type = $2)",
        )
        .bind(completion.user_id)
        .bind(&completion.task_type)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Err(StoreError::DuplicateTask);
        }

        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (id, user_id, task_type, points, completed_at)
             VALUES ($1, $2, $3, $4, NOW())
             RETURNING id, user_id, task_type, points, completed_at",
        )
        .bind(Uuid::new_v4())
        .bind(completion.user_id)
        .bind(&completion.task_type)
        .bind(completion.points)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateTask
            } else {
                StoreError::Database(e)
            }
        })?;

        sqlx::query("UPDATE users SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
            .bind(completion.points)
            .bind(completion.user_id)
            .execute(&mut *tx)
            .await?;

        let credited_referrer = match completion.referral_bonus {
            Some(bonus) => match Self::credit_referrer(&mut tx, completion.user_id, bonus).await {
                Ok(referrer) => referrer,
                Err(e) => {
                    tracing::warn!(user_id = %completion.user_id, error = ?e, "referral bonus not credited");
                    None
                }
            },
            None => None,
        };

        tx.commit().await?;

        Ok(CompletionReceipt {
            task,
            credited_referrer,
        })
    }

    async fn assign_referrer(&self, user_id: Uuid, referrer_id: Uuid) -> Result<bool, StoreError> {
        // Guarded write: a concurrent assignment that loses the race updates nothing.
        let result = sqlx::query(
            "UPDATE users SET referrer_id = $1, updated_at = NOW()
             WHERE id = $2 AND referrer_id IS NULL",
        )
        .bind(referrer_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT id, user_id, task_type, points, completed_at
             FROM tasks WHERE user_id = $1 ORDER BY completed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn top_balances(&self, limit: i64) -> Result<Vec<BalanceRow>, StoreError> {
        let rows = sqlx::query_as::<_, BalanceRow>(
            "SELECT id AS user_id, username, balance
             FROM users
             ORDER BY balance DESC, created_at ASC, id ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// These run against a real Postgres: `DATABASE_URL=... cargo test -- --ignored`.
/// Each test gets a fresh database with `migrations/` applied.
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::catalog::{TaskCatalog, PROFILE_COMPLETE, REFERRAL_CODE};
    use crate::error::ServiceError;
    use crate::service::tasks::TaskCompletionEngine;

    async fn insert_user(pool: &PgPool, name: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO users (id, username, email) VALUES ($1, $2, $3) RETURNING id")
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(format!("{name}@example.com"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn balance(pool: &PgPool, id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn task_rows(pool: &PgPool, id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE user_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_duplicates_commit_once(pool: PgPool) {
        let user = insert_user(&pool, "alice").await;
        let engine = TaskCompletionEngine::new(
            Arc::new(PgLedger::new(pool.clone())),
            Arc::new(TaskCatalog::default()),
        );

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = engine.clone();
                let id = user.to_string();
                tokio::spawn(async move { engine.complete_task(&id, PROFILE_COMPLETE).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ServiceError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(balance(&pool, user).await, 30);
        assert_eq!(task_rows(&pool, user).await, 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn duplicate_insert_is_unique_violation(pool: PgPool) {
        let user = insert_user(&pool, "alice").await;
        let insert = "INSERT INTO tasks (id, user_id, task_type, points) VALUES ($1, $2, 'email_verify', 25)";

        sqlx::query(insert)
            .bind(Uuid::new_v4())
            .bind(user)
            .execute(&pool)
            .await
            .unwrap();
        let err = sqlx::query(insert)
            .bind(Uuid::new_v4())
            .bind(user)
            .execute(&pool)
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn referral_bonus_is_credited_in_the_same_commit(pool: PgPool) {
        let referrer = insert_user(&pool, "referrer").await;
        let newcomer = insert_user(&pool, "newcomer").await;
        let ledger = PgLedger::new(pool.clone());
        assert!(ledger.assign_referrer(newcomer, referrer).await.unwrap());

        let receipt = ledger
            .record_completion(NewCompletion {
                user_id: newcomer,
                task_type: REFERRAL_CODE.to_string(),
                points: 100,
                referral_bonus: Some(50),
            })
            .await
            .unwrap();

        assert_eq!(receipt.credited_referrer, Some(referrer));
        assert_eq!(balance(&pool, newcomer).await, 100);
        assert_eq!(balance(&pool, referrer).await, 50);
        assert_eq!(task_rows(&pool, referrer).await, 0);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn referral_bonus_without_referrer_credits_only_user(pool: PgPool) {
        let solo = insert_user(&pool, "solo").await;
        let ledger = PgLedger::new(pool.clone());

        let receipt = ledger
            .record_completion(NewCompletion {
                user_id: solo,
                task_type: REFERRAL_CODE.to_string(),
                points: 100,
                referral_bonus: Some(50),
            })
            .await
            .unwrap();

        assert_eq!(receipt.credited_referrer, None);
        assert_eq!(balance(&pool, solo).await, 100);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn missing_referrer_row_skips_bonus_but_commits_task(pool: PgPool) {
        let newcomer = insert_user(&pool, "newcomer").await;
        // Without the foreign key the referrer reference can dangle.
        sqlx::query("ALTER TABLE users DROP CONSTRAINT users_referrer_id_fkey")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE users SET referrer_id = $1 WHERE id = $2")
            .bind(Uuid::new_v4())
            .bind(newcomer)
            .execute(&pool)
            .await
            .unwrap();

        let receipt = PgLedger::new(pool.clone())
            .record_completion(NewCompletion {
                user_id: newcomer,
                task_type: REFERRAL_CODE.to_string(),
                points: 100,
                referral_bonus: Some(50),
            })
            .await
            .unwrap();

        assert_eq!(receipt.credited_referrer, None);
        assert_eq!(balance(&pool, newcomer).await, 100);
        assert_eq!(task_rows(&pool, newcomer).await, 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn referrer_is_written_once(pool: PgPool) {
        let user = insert_user(&pool, "u").await;
        let first = insert_user(&pool, "r1").await;
        let second = insert_user(&pool, "r2").await;
        let ledger = PgLedger::new(pool);

        assert!(ledger.assign_referrer(user, first).await.unwrap());
        assert!(!ledger.assign_referrer(user, second).await.unwrap());

        let stored = ledger.find_user(user).await.unwrap().unwrap();
        assert_eq!(stored.referrer_id, Some(first));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn top_balances_break_ties_by_creation(pool: PgPool) {
        let base = Utc::now();
        let mut ids = Vec::new();
        for (i, balance) in [10_i64, 40, 10, 0].into_iter().enumerate() {
            let id: Uuid = sqlx::query_scalar(
                "INSERT INTO users (id, username, email, balance, created_at)
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(format!("user{i}"))
            .bind(format!("user{i}@example.com"))
            .bind(balance)
            .bind(base + Duration::seconds(i as i64))
            .fetch_one(&pool)
            .await
            .unwrap();
            ids.push(id);
        }

        let rows = PgLedger::new(pool).top_balances(3).await.unwrap();

        let order: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
        assert_eq!(order, vec![ids[1], ids[0], ids[2]]);
    }
}
