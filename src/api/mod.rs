// API 路由汇总入口，按领域拆分以保持结构清晰。
pub mod chat;
pub mod errors;
pub mod patients;

use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn build_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .merge(patients::router())
        .merge(chat::router())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "Healthy",
        "service": state.config.app.name,
        "version": state.config.app.version,
        "env": state.config.app.environment,
    }))
}
