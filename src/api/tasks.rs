use axum::extract::{Path, State};
use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::json_body;
use crate::{auth::AuthUser, error::AppError, AppState};

#[derive(Deserialize)]
struct CompleteTaskRequest {
    #[serde(default)]
    task_type: String,
}

/// Public catalog listing.
pub fn routes() -> Router<AppState> {
    Router::new().route("/tasks", get(get_tasks))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/users/:id/task/complete", post(complete_task))
}

async fn get_tasks(State(state): State<AppState>) -> Json<serde_json::Value> {
    let tasks: Vec<_> = state
        .catalog
        .task_types()
        .filter_map(|name| {
            state
                .catalog
                .points_for(name)
                .map(|points| json!({ "task_type": name, "points": points }))
        })
        .collect();

    Json(json!({ "tasks": tasks }))
}

async fn complete_task(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(user_id): Path<String>,
    payload: Result<Json<CompleteTaskRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    // The path id is checked before the body so an unknown user wins over a bad payload.
    let user_id = state.tasks.resolve_user(&user_id).await?;
    let req = json_body(payload)?;
    tracing::debug!(caller = %caller.0, %user_id, task_type = %req.task_type, "complete task");

    let done = state.tasks.complete_for(user_id, &req.task_type).await?;

    Ok(Json(json!({
        "message": "Task completed successfully",
        "task_id": done.task_id,
        "points": done.points,
    })))
}
