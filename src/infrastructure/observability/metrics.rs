use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder. Without it the `record_*` calls are no-ops.
pub fn init_metrics() -> Option<PrometheusMetrics> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("sql_agent_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized at /metrics");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// One finished run, labelled by outcome
pub fn record_run(outcome: &str) {
    counter!("sql_agent_runs_total", "outcome" => outcome.to_string()).increment(1);
}

/// One generate/validate/execute stage result, e.g. `("validate", "rejected")`
pub fn record_attempt(stage: &str, result: &str) {
    counter!(
        "sql_agent_attempts_total",
        "stage" => stage.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}

pub fn record_step(step: &str, duration: Duration) {
    histogram!("sql_agent_step_duration_seconds", "step" => step.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}
