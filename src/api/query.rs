//! Question endpoints: one-shot JSON and a server-sent event stream of the trace

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use super::state::AppState;
use super::types::{ApiError, Json};
use crate::domain::workflow::RunResult;

const TRACE_BUFFER: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

impl QueryRequest {
    fn question(&self) -> Result<String, ApiError> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(ApiError::bad_request("question must not be empty").with_code("empty_question"));
        }
        Ok(question.to_string())
    }
}

/// POST /api/query
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<RunResult>, ApiError> {
    let question = request.question()?;

    // dropped with the request future when the client goes away
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let result = state.orchestrator.run(&question, cancel, None).await;
    info!(run_id = %result.run_id, outcome = result.outcome.as_str(), "Query answered");

    Ok(Json(result))
}

/// POST /api/query/stream
///
/// Emits one `trace` event per step as it completes, then a single `result` event.
pub async fn query_stream(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let question = request.question()?;

    let (sender, receiver) = mpsc::channel(TRACE_BUFFER);
    let cancel = state.shutdown.child_token();
    let guard = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.run(&question, cancel, Some(sender)).await });

    let trace = ReceiverStream::new(receiver).map(|entry| Ok(json_event("trace", &entry)));
    let result = stream::once(async move {
        // the run is cancelled if the client disconnects before this point
        let _guard = guard;
        let event = match run.await {
            Ok(result) => json_event("result", &result),
            Err(e) => {
                warn!(error = %e, "Streaming run aborted");
                Event::default().event("error").data(e.to_string())
            }
        };
        Ok(event)
    });

    Ok(Sse::new(trace.chain(result)).keep_alive(KeepAlive::default()))
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
