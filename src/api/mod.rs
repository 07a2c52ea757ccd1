mod command;
pub mod middleware;
mod webhook;

pub use command::slash_command;
pub use webhook::circleci_webhook;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppContext;

/// Every HTTP endpoint the bridge serves
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/webhook", post(circleci_webhook))
        .route("/command", post(slash_command))
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(middleware::add_trace_id))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
