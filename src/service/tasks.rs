use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    catalog::TaskCatalog,
    db::LedgerStore,
    error::ServiceError,
    models::task::NewCompletion,
};

use super::parse_user_id;

#[derive(Debug, Clone, Serialize)]
pub struct CompletedTask {
    pub task_id: Uuid,
    pub points: i64,
}

/// Validates completion requests and runs the completion transaction.
#[derive(Clone)]
pub struct TaskCompletionEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<TaskCatalog>,
}

impl TaskCompletionEngine {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<TaskCatalog>) -> Self {
        TaskCompletionEngine { store, catalog }
    }

    /// Records `task_type` as completed by `user_id` and credits the points.
    ///
    /// Completing the catalog's referral task also credits the user's referrer
    /// with half the points, rounded down. All validation happens before the
    /// transaction opens; a duplicate that slips past the pre-check (a concurrent
    /// request) is still rejected by the store as a conflict.
    pub async fn complete_task(
        &self,
        user_id: &str,
        task_type: &str,
    ) -> Result<CompletedTask, ServiceError> {
        let user_id = self.resolve_user(user_id).await?;
        self.complete_for(user_id, task_type).await
    }

    /// Parses the identifier and checks the user exists.
    pub async fn resolve_user(&self, user_id: &str) -> Result<Uuid, ServiceError> {
        let user_id = parse_user_id(user_id)?;

        if !self.store.user_exists(user_id).await? {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(user_id)
    }

    /// Completion for a user already returned by [`Self::resolve_user`].
    pub async fn complete_for(
        &self,
        user_id: Uuid,
        task_type: &str,
    ) -> Result<CompletedTask, ServiceError> {
        if task_type.is_empty() {
            return Err(ServiceError::validation(
                "task_type is required",
                "Field 'task_type' cannot be empty",
            ));
        }

        let points = self.catalog.points_for(task_type).ok_or_else(|| {
            ServiceError::validation(
                "Unknown task type",
                format!(
                    "Valid task types: {}",
                    self.catalog.task_types().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;

        if self.store.has_completed(user_id, task_type).await? {
            return Err(ServiceError::conflict("Task already completed"));
        }

        let referral_bonus = self
            .catalog
            .is_referral_task(task_type)
            .then(|| self.catalog.referral_bonus(points));

        let receipt = self
            .store
            .record_completion(NewCompletion {
                user_id,
                task_type: task_type.to_string(),
                points,
                referral_bonus,
            })
            .await?;

        tracing::info!(
            %user_id,
            task_type,
            points,
            referrer = ?receipt.credited_referrer,
            "task completed"
        );

        Ok(CompletedTask {
            task_id: receipt.task.id,
            points: receipt.task.points,
        })
    }
}
