//! 指标与健康检查端点

use crate::metrics::{InMemoryRecorder, SeriesSnapshot};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_HEALTH_PATH: &str = "/status";

pub fn router(metrics_path: &str, health_path: &str, recorder: Arc<InMemoryRecorder>) -> Router {
    Router::new()
        .route(metrics_path, get(metrics))
        .route(health_path, get(health))
        .with_state(recorder)
}

async fn metrics(State(recorder): State<Arc<InMemoryRecorder>>) -> Json<Vec<SeriesSnapshot>> {
    Json(recorder.snapshot())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
