pub mod memory;
pub mod webhook;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(webhook::router())
        .nest("/memory", memory::router())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
