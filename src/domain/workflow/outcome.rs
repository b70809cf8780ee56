use serde::{Deserialize, Serialize};

use super::{ChartSpec, RunFailure, TraceEntry, WorkflowState};
use crate::domain::database::QueryRows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Answered,
    Rejected,
    Clarification,
    Failed,
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::Rejected => "rejected",
            Self::Clarification => "clarification",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Terminal result of one run; `final_answer` is never empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub question: String,
    pub outcome: RunOutcome,
    pub final_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<QueryRows>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    pub attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    pub trace: Vec<TraceEntry>,
}

impl RunResult {
    pub fn from_state(state: WorkflowState, outcome: RunOutcome) -> Self {
        let final_answer = state
            .final_answer
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| match outcome {
                RunOutcome::Cancelled => "The run was cancelled before it completed.".to_string(),
                _ => "The run ended without producing an answer.".to_string(),
            });

        Self {
            run_id: state.run_id.clone(),
            question: state.question().to_string(),
            outcome,
            final_answer,
            sql: state.sql().map(str::to_string),
            rows: state.rows().cloned(),
            chart: state.chart.clone(),
            attempt_count: state.attempt_count,
            failure: state.failure.clone(),
            trace: state.trace().to_vec(),
        }
    }
}
