use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/ping", get(ping))
}

/// Verifies the store is reachable.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.store().ping().await?;
    Ok(Json(json!({ "status": "ok", "store": "connected" })))
}

async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
