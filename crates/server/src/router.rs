use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use vigil_core::collector::Collector;

pub fn create_router(collector: Arc<dyn Collector>) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(collector)
        .layer(TraceLayer::new_for_http())
}

/// Serves the Prometheus exposition page. Gauges are refreshed on every
/// scrape; the caching layers underneath decide which node calls actually
/// go out.
pub async fn handle_metrics(
    axum::extract::State(collector): axum::extract::State<Arc<dyn Collector>>,
) -> impl IntoResponse {
    let page = collector.collect().await;

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        page,
    )
}

pub async fn handle_health(
    axum::extract::State(collector): axum::extract::State<Arc<dyn Collector>>,
) -> impl IntoResponse {
    let health_status = serde_json::json!({
        "status": "ok",
        "chain": collector.chain(),
    });

    (
        StatusCode::OK,
        [("content-type", "application/json")],
        serde_json::to_string(&health_status).unwrap_or_default(),
    )
}
