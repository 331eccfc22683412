use axum::extract::{Path, Query, State};
use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::json_body;
use crate::{auth::AuthUser, error::AppError, service::parse_user_id, AppState};

#[derive(Deserialize)]
struct SetReferrerRequest {
    #[serde(default)]
    referrer_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/leaderboard", get(get_leaderboard))
        .route("/users/:id/status", get(get_status))
        .route("/users/:id/referrer", post(set_referrer))
}

async fn get_status(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::debug!(caller = %caller.0, user_id = %user_id, "status lookup");
    let status = state.status.user_status(&user_id).await?;
    Ok(Json(json!(status)))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let leaderboard = state
        .status
        .leaderboard(params.get("limit").map(String::as_str))
        .await?;
    Ok(Json(json!({ "leaderboard": leaderboard })))
}

async fn set_referrer(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(user_id): Path<String>,
    payload: Result<Json<SetReferrerRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    parse_user_id(&user_id)?;
    let req = json_body(payload)?;
    tracing::debug!(caller = %caller.0, user_id = %user_id, "set referrer");

    state.referrals.set_referrer(&user_id, &req.referrer_id).await?;

    Ok(Json(json!({ "message": "Referrer set successfully" })))
}
