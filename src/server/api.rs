//! Route definitions

use super::{handlers, AppState};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Visit / for the form or /health to check status.",
        })),
    )
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new().route("/predict", post(handlers::predict_json));

    Router::new()
        .route("/", get(handlers::index))
        .route("/predict", post(handlers::predict_form))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes)
        .fallback(handle_404)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
