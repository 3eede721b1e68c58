use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub fn router() -> Router<crate::state::AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
}

async fn liveness() -> &'static str {
    "mux worker is running"
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true
    }))
}
