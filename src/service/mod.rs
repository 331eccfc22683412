pub mod referrals;
pub mod status;
pub mod tasks;

use uuid::Uuid;

use crate::error::ServiceError;

pub(crate) fn parse_user_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| {
        ServiceError::validation("Invalid user ID format", "User ID must be a valid UUID")
    })
}
