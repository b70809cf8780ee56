//! Prometheus metrics for runs, attempts and HTTP traffic

mod metrics;

pub use metrics::{
    create_metrics_router, init_metrics, record_attempt, record_http_request, record_run,
    record_step, PrometheusMetrics,
};
