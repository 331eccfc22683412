pub mod auth;
pub mod tasks;
pub mod user;

use std::time::Duration;

use axum::{
    extract::rejection::JsonRejection,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{auth::require_auth, error::AppError, AppState};

/// Full application router: public routes, authenticated `/users` routes and the shared layers.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let protected = Router::new()
        .merge(user::routes())
        .merge(tasks::protected_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(auth::routes())
        .merge(tasks::routes())
        .merge(protected)
        .with_state(state);

    with_layers(app, request_timeout)
}

/// Panic recovery, request timeout, tracing and CORS.
pub fn with_layers(app: Router, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::custom(recover_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn recover_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Panic recovered");
    AppError::internal().into_response()
}

pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        AppError::validation("Invalid request body", "Request body must be valid JSON")
    })
}
