use serde::{Deserialize, Serialize};

use super::{ChartSpec, Complexity, Intent, MetaQuery, RunFailure, TraceEntry};
use crate::domain::catalog::SchemaElement;
use crate::domain::database::{ExecutionError, QueryRows};
use crate::domain::retrieval::Example;
use crate::domain::validation::ValidationVerdict;

/// Where in the generate/validate/execute cycle an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Generation,
    Validation,
    Execution,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Validation => "validation",
            Self::Execution => "execution",
        }
    }

    /// Phrase completing "the attempt failed ..."
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Generation => "during generation",
            Self::Validation => "validation",
            Self::Execution => "during execution",
        }
    }
}

/// One failed attempt, kept so the next generation can learn from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub attempt: u32,
    pub stage: FailureStage,
    pub sql: Option<String>,
    pub message: String,
}

/// Result of the EXECUTE step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Rows(QueryRows),
    Error(ExecutionError),
}

/// Values found by an existence probe for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationFinding {
    pub term: String,
    pub table: String,
    pub column: String,
    pub values: Vec<String>,
}

/// The single record threaded through every step of one run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub run_id: String,
    question: String,
    pub intent: Intent,
    pub complexity: Complexity,
    pub entities: Vec<String>,
    pub ambiguity: Vec<String>,
    pub meta_query: Option<MetaQuery>,
    retrieved_schema: Vec<SchemaElement>,
    pub examples: Vec<Example>,
    pub exploration: Vec<ExplorationFinding>,
    pub plan: Option<String>,
    sql: Option<String>,
    pub validation_result: Option<ValidationVerdict>,
    execution_result: Option<ExecutionOutcome>,
    pub attempt_count: u32,
    pub failures: Vec<AttemptFailure>,
    trace: Vec<TraceEntry>,
    pub final_answer: Option<String>,
    pub chart: Option<ChartSpec>,
    pub failure: Option<RunFailure>,
}

impl WorkflowState {
    pub fn new(run_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            question: question.into(),
            intent: Intent::default(),
            complexity: Complexity::default(),
            entities: Vec::new(),
            ambiguity: Vec::new(),
            meta_query: None,
            retrieved_schema: Vec::new(),
            examples: Vec::new(),
            exploration: Vec::new(),
            plan: None,
            sql: None,
            validation_result: None,
            execution_result: None,
            attempt_count: 0,
            failures: Vec::new(),
            trace: Vec::new(),
            final_answer: None,
            chart: None,
            failure: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn retrieved_schema(&self) -> &[SchemaElement] {
        &self.retrieved_schema
    }

    /// Adds an element unless one with the same id is already present
    pub fn add_schema_element(&mut self, element: SchemaElement) -> bool {
        if self.retrieved_schema.iter().any(|e| e.id == element.id) {
            return false;
        }
        self.retrieved_schema.push(element);
        true
    }

    /// Owning tables of the retrieved elements, first-seen order
    pub fn retrieved_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for element in &self.retrieved_schema {
            if !tables.iter().any(|t| t == &element.table) {
                tables.push(element.table.clone());
            }
        }
        tables
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Stores a fresh candidate; the previous verdict and execution result no longer apply
    pub fn set_candidate_sql(&mut self, sql: impl Into<String>) {
        self.sql = Some(sql.into());
        self.validation_result = None;
        self.execution_result = None;
    }

    /// Replaces the candidate with its sanitized form after a successful validation
    pub fn accept_sanitized_sql(&mut self, sanitized: impl Into<String>) {
        self.sql = Some(sanitized.into());
    }

    pub fn execution_result(&self) -> Option<&ExecutionOutcome> {
        self.execution_result.as_ref()
    }

    /// Records the execution result. Only valid right after an accepted validation.
    pub fn set_execution_result(&mut self, outcome: ExecutionOutcome) -> bool {
        if !matches!(self.validation_result, Some(ValidationVerdict::Ok { .. })) {
            return false;
        }
        self.execution_result = Some(outcome);
        true
    }

    pub fn rows(&self) -> Option<&QueryRows> {
        match &self.execution_result {
            Some(ExecutionOutcome::Rows(rows)) => Some(rows),
            _ => None,
        }
    }

    pub fn record_failure(&mut self, stage: FailureStage, message: impl Into<String>) {
        self.failures.push(AttemptFailure {
            attempt: self.attempt_count,
            stage,
            // a failed generation produced no SQL of its own
            sql: match stage {
                FailureStage::Generation => None,
                _ => self.sql.clone(),
            },
            message: message.into(),
        });
    }

    pub fn last_failure(&self) -> Option<&AttemptFailure> {
        self.failures.last()
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Append-only
    pub fn push_trace(&mut self, entry: TraceEntry) -> &TraceEntry {
        self.trace.push(entry);
        &self.trace[self.trace.len() - 1]
    }
}
