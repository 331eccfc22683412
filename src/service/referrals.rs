use std::sync::Arc;

use crate::{db::LedgerStore, error::ServiceError};

use super::parse_user_id;

#[derive(Clone)]
pub struct ReferralService {
    store: Arc<dyn LedgerStore>,
}

impl ReferralService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        ReferralService { store }
    }

    /// Links `user_id` to the user who referred them. The link is write-once.
    ///
    /// The "already has a referrer" check and the write are separate statements.
    /// The write itself only applies while no referrer is set, so of two racing
    /// assignments the loser reports a conflict instead of overwriting the winner.
    pub async fn set_referrer(&self, user_id: &str, referrer_id: &str) -> Result<(), ServiceError> {
        let user_id = parse_user_id(user_id)?;

        if referrer_id.is_empty() {
            return Err(ServiceError::validation(
                "referrer_id is required",
                "Field 'referrer_id' cannot be empty",
            ));
        }

        let referrer_id = uuid::Uuid::parse_str(referrer_id).map_err(|_| {
            ServiceError::validation(
                "Invalid referrer ID format",
                "Referrer ID must be a valid UUID",
            )
        })?;

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if !self.store.user_exists(referrer_id).await? {
            return Err(ServiceError::NotFound("Referrer"));
        }

        if user_id == referrer_id {
            return Err(ServiceError::validation(
                "User cannot refer themselves",
                "A user cannot set themselves as their own referrer",
            ));
        }

        if user.referrer_id.is_some() {
            return Err(ServiceError::conflict("User already has a referrer"));
        }

        if !self.store.assign_referrer(user_id, referrer_id).await? {
            return Err(ServiceError::conflict("User already has a referrer"));
        }

        tracing::info!(%user_id, %referrer_id, "referrer set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fixtures::ledger_with_users;
    use uuid::Uuid;

    #[tokio::test]
    async fn referrer_is_write_once() {
        let (ledger, users) = ledger_with_users(&["u", "r1", "r2"]).await;
        let service = ReferralService::new(ledger.clone());
        let (u, r1, r2) = (users[0].id.to_string(), users[1].id.to_string(), users[2].id.to_string());

        service.set_referrer(&u, &r1).await.unwrap();
        let err = service.set_referrer(&u, &r2).await.unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(ref m) if m == "User already has a referrer"));
        let stored = ledger.find_user(users[0].id).await.unwrap().unwrap();
        assert_eq!(stored.referrer_id, Some(users[1].id));
    }

    #[tokio::test]
    async fn self_referral_is_a_validation_error() {
        let (ledger, users) = ledger_with_users(&["u", "r"]).await;
        let service = ReferralService::new(ledger.clone());
        let u = users[0].id.to_string();

        let err = service.set_referrer(&u, &u).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref message, .. } if message == "User cannot refer themselves"));

        // Still validation, not conflict, once a referrer exists.
        service.set_referrer(&u, &users[1].id.to_string()).await.unwrap();
        let err = service.set_referrer(&u, &u).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_and_malformed_fields() {
        let (ledger, users) = ledger_with_users(&["u"]).await;
        let service = ReferralService::new(ledger);
        let u = users[0].id.to_string();

        let err = service.set_referrer("bogus", &u).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref message, .. } if message == "Invalid user ID format"));

        let err = service.set_referrer(&u, "").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref message, .. } if message == "referrer_id is required"));

        let err = service.set_referrer(&u, "bogus").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref message, .. } if message == "Invalid referrer ID format"));
    }

    #[tokio::test]
    async fn not_found_names_which_side_is_missing() {
        let (ledger, users) = ledger_with_users(&["u"]).await;
        let service = ReferralService::new(ledger);
        let u = users[0].id.to_string();
        let ghost = Uuid::new_v4().to_string();

        let err = service.set_referrer(&ghost, &u).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("User")));

        let err = service.set_referrer(&u, &ghost).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Referrer")));
    }

    #[tokio::test]
    async fn racing_assignments_keep_first_writer() {
        let (ledger, users) = ledger_with_users(&["u", "r1", "r2"]).await;

        assert!(ledger.assign_referrer(users[0].id, users[1].id).await.unwrap());
        assert!(!ledger.assign_referrer(users[0].id, users[2].id).await.unwrap());

        let stored = ledger.find_user(users[0].id).await.unwrap().unwrap();
        assert_eq!(stored.referrer_id, Some(users[1].id));
    }
}
