use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::health;
use super::middleware::metrics_middleware;
use super::query;
use super::schema;
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Routes under `/api`
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/query", post(query::query))
        .route("/query/stream", post(query::query_stream))
        .route("/schema", get(schema::get_schema))
}

/// The full application; `/metrics` is mounted only when a recorder was installed
pub fn create_router(state: AppState, metrics: Option<PrometheusMetrics>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .nest("/api", create_api_router())
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    if let Some(m) = metrics {
        router = router.merge(create_metrics_router(m));
    }

    router
}
