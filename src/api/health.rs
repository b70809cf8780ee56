//! Liveness and readiness endpoints

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use super::types::Json;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// GET /health - the process is up
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// GET /ready - the database answers and the retrieval index is loaded.
///
/// An empty index only degrades readiness: lookups still work through keyword matching.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let checks = vec![check_database(&state).await, check_index(&state)];

    let status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        latency_ms: Some(elapsed_ms(start)),
    };

    let status_code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

async fn check_database(state: &AppState) -> HealthCheck {
    let start = Instant::now();

    let failure = match tokio::time::timeout(PROBE_TIMEOUT, state.database.execute("SELECT 1")).await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no answer within {}ms", PROBE_TIMEOUT.as_millis())),
    };

    HealthCheck {
        name: "database".to_string(),
        status: if failure.is_some() {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        },
        message: failure,
        latency_ms: Some(elapsed_ms(start)),
    }
}

fn check_index(state: &AppState) -> HealthCheck {
    let index = state.orchestrator.index();

    let (status, message) = if index.is_empty() {
        (
            HealthStatus::Degraded,
            "index is empty, schema lookup uses keyword matching".to_string(),
        )
    } else {
        (
            HealthStatus::Healthy,
            format!("{} elements, model {}", index.elements().len(), index.model()),
        )
    };

    HealthCheck {
        name: "retrieval_index".to_string(),
        status,
        message: Some(message),
        latency_ms: None,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::fixtures;
    use crate::domain::database::{ExecutionError, MockQueryExecutor, QueryRows};
    use crate::domain::llm::MockLlmProvider;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Healthy).unwrap(), "\"healthy\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded).unwrap(), "\"degraded\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Unhealthy).unwrap(), "\"unhealthy\"");
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_index_degrades_readiness() {
        let mut executor = MockQueryExecutor::new();
        executor
            .expect_execute()
            .withf(|sql| sql == "SELECT 1")
            .returning(|_| Ok(QueryRows::default()));
        let state = fixtures::state(MockLlmProvider::new("mock"), executor);

        assert_eq!(check_database(&state).await.status, HealthStatus::Healthy);
        let index = check_index(&state);
        assert_eq!(index.status, HealthStatus::Degraded);
        assert!(index.message.unwrap().contains("keyword"));

        let response = ready_check(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_unhealthy() {
        let mut executor = MockQueryExecutor::new();
        executor
            .expect_execute()
            .returning(|_| Err(ExecutionError::connection("unable to open database file")));
        let state = fixtures::state(MockLlmProvider::new("mock"), executor);

        let check = check_database(&state).await;
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert_eq!(check.message.as_deref(), Some("unable to open database file"));

        let response = ready_check(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
