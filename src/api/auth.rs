use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};
use serde_json::json;

use crate::{error::AppError, service::parse_user_id, AppState};

/// Token issuance for testing; not behind the access gate.
pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/token/:id", get(issue_token))
}

async fn issue_token(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = parse_user_id(&user_id)?;

    let exists = state.store.user_exists(user_id).await.map_err(|e| {
        tracing::error!(error = ?e, %user_id, "user lookup failed");
        AppError::internal()
    })?;
    if !exists {
        return Err(AppError::not_found("User"));
    }

    let token = state.gate.issue(user_id).map_err(|e| {
        tracing::error!(error = ?e, "Error generating token");
        AppError::internal()
    })?;

    Ok(Json(json!({ "token": token, "user_id": user_id.to_string() })))
}
