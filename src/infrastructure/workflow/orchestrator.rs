//! Executes the text-to-SQL state machine.
//!
//! Routing decisions come from [`routing`]; this module runs the step bodies, calls the
//! collaborators under the step timeout and records every step in the run trace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::parsing::{extract_sql, parse_understanding};
use super::prompts::{self, GenerationContext};
use crate::domain::catalog::SchemaCatalog;
use crate::domain::database::{ExecutionError, QueryExecutor};
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::retrieval::{RetrievalError, RetrievalIndex};
use crate::domain::validation::{SqlValidator, ValidationVerdict};
use crate::domain::workflow::{
    plan_chart, routing, AgentSettings, Complexity, ExecutionOutcome, ExplorationFinding,
    FailureStage, MetaQuery, RunFailure, RunOutcome, RunResult, Step, TraceEntry, WorkflowState,
};
use crate::domain::DomainError;
use crate::infrastructure::index::SchemaRetriever;
use crate::infrastructure::observability::{record_attempt, record_run, record_step};

const EXPLORE_VALUE_LIMIT: usize = 10;

/// One run in flight
struct Run {
    state: WorkflowState,
    outcome: Option<RunOutcome>,
    events: Option<mpsc::Sender<TraceEntry>>,
}

impl Run {
    async fn trace(&mut self, step: Step, input: impl Into<String>, output: impl Into<String>) {
        let entry = self
            .state
            .push_trace(TraceEntry::new(step, input, output))
            .clone();

        if let Some(events) = &self.events {
            // receiver may have gone away
            let _ = events.send(entry).await;
        }
    }
}

/// An existence check for one entity against one text column
struct Probe {
    term: String,
    table: String,
    column: String,
    sql: String,
}

/// Drives one question from UNDERSTAND to a terminal state
pub struct WorkflowOrchestrator {
    llm: Arc<dyn LlmProvider>,
    executor: Arc<dyn QueryExecutor>,
    retriever: SchemaRetriever,
    catalog: Arc<SchemaCatalog>,
    validator: SqlValidator,
    settings: AgentSettings,
}

impl WorkflowOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        executor: Arc<dyn QueryExecutor>,
        retriever: SchemaRetriever,
        catalog: Arc<SchemaCatalog>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm,
            executor,
            retriever,
            catalog,
            validator: SqlValidator::new(settings.row_cap),
            settings,
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn index(&self) -> &RetrievalIndex {
        self.retriever.index()
    }

    /// Answers one question.
    ///
    /// Always returns a result with a non-empty `final_answer`; failures are part of the
    /// result, not errors. Trace entries are also sent to `events` as they are appended.
    pub async fn run(
        &self,
        question: &str,
        cancel: CancellationToken,
        events: Option<mpsc::Sender<TraceEntry>>,
    ) -> RunResult {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);

        self.drive(run_id, question, cancel, events)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        run_id: String,
        question: &str,
        cancel: CancellationToken,
        events: Option<mpsc::Sender<TraceEntry>>,
    ) -> RunResult {
        let mut run = Run {
            state: WorkflowState::new(run_id, question.trim()),
            outcome: None,
            events,
        };
        let mut step = Step::Understand;

        info!(question = run.state.question(), "Run started");

        while step != Step::Done {
            if cancel.is_cancelled() {
                self.cancel(&mut run, step).await;
                break;
            }

            let started = Instant::now();
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = self.execute_step(step, &mut run) => Some(next),
            };
            record_step(step.name(), started.elapsed());

            match next {
                Some(next) => {
                    debug!(
                        step = step.name(),
                        next = next.name(),
                        attempt = run.state.attempt_count,
                        "Transition"
                    );
                    step = next;
                }
                None => {
                    self.cancel(&mut run, step).await;
                    break;
                }
            }
        }

        let outcome = run.outcome.unwrap_or(RunOutcome::Failed);
        record_run(outcome.as_str());
        info!(
            outcome = outcome.as_str(),
            attempts = run.state.attempt_count,
            "Run finished"
        );

        RunResult::from_state(run.state, outcome)
    }

    async fn execute_step(&self, step: Step, run: &mut Run) -> Step {
        match step {
            Step::Understand => self.understand(run).await,
            Step::Reject => self.reject(run).await,
            Step::Clarify => self.clarify(run).await,
            Step::Meta => self.meta(run).await,
            Step::SchemaLookup => self.schema_lookup(run).await,
            Step::Explore => self.explore(run).await,
            Step::Plan => self.plan(run).await,
            Step::Generate => self.generate(run).await,
            Step::Validate => self.validate(run).await,
            Step::Execute => self.execute(run).await,
            Step::Answer => self.answer(run).await,
            Step::Visualize => self.visualize(run).await,
            Step::Fail => self.fail(run).await,
            Step::Done => Step::Done,
        }
    }

    async fn understand(&self, run: &mut Run) -> Step {
        let question = run.state.question().to_string();
        let request = prompts::understand(
            &question,
            &self.catalog.table_names(),
            self.settings.temperature,
        );

        let parsed = match self.complete("understand", request).await {
            Ok(reply) => parse_understanding(&reply),
            Err(e @ DomainError::MalformedResponse { .. }) => Err(e.to_string()),
            Err(e) => return self.abort(run, Step::Understand, "llm", e.to_string()).await,
        };

        let output = match parsed {
            Ok(understanding) => {
                run.state.intent = understanding.intent;
                run.state.complexity = understanding.complexity;
                run.state.entities = understanding.entities;
                run.state.ambiguity = understanding.ambiguity;

                format!(
                    "intent={} complexity={} entities=[{}] ambiguity=[{}]",
                    label(&run.state.intent),
                    label(&run.state.complexity),
                    run.state.entities.join(", "),
                    run.state.ambiguity.join(", ")
                )
            }
            Err(issue) => {
                warn!(issue = %issue, "Classification failed, defaulting to NORMAL/MODERATE");
                run.state.intent = Default::default();
                run.state.complexity = Default::default();

                format!("ClassificationFailure: {}; defaulting to intent=NORMAL complexity=MODERATE", issue)
            }
        };

        run.trace(Step::Understand, question, output).await;
        routing::after_understand(&run.state)
    }

    async fn reject(&self, run: &mut Run) -> Step {
        run.state.final_answer = Some(prompts::REJECTION_MESSAGE.to_string());
        run.outcome = Some(RunOutcome::Rejected);
        run.trace(Step::Reject, "intent=IRRELEVANT", "declined").await;
        then(Step::Reject)
    }

    async fn clarify(&self, run: &mut Run) -> Step {
        let message = prompts::clarification(run.state.question(), &run.state.ambiguity);
        let input = format!("ambiguity=[{}]", run.state.ambiguity.join(", "));

        run.state.final_answer = Some(message.clone());
        run.outcome = Some(RunOutcome::Clarification);
        run.trace(Step::Clarify, input, message).await;
        then(Step::Clarify)
    }

    async fn meta(&self, run: &mut Run) -> Step {
        let query = MetaQuery::from_question(run.state.question(), &self.catalog);
        let sql = query.sql();

        run.state.attempt_count += 1;
        run.state.set_candidate_sql(sql.clone());
        run.trace(Step::Meta, query.describe(), sql).await;
        run.state.meta_query = Some(query);

        then(Step::Meta)
    }

    async fn schema_lookup(&self, run: &mut Run) -> Step {
        let question = run.state.question().to_string();
        let entities = run.state.entities.clone();

        let lookup = match tokio::time::timeout(
            self.settings.step_timeout,
            self.retriever.lookup(&question, &entities),
        )
        .await
        {
            Ok(lookup) => lookup,
            Err(_) => self.retriever.keyword_lookup(
                &question,
                &entities,
                Some(RetrievalError::embedding_unavailable(format!(
                    "lookup timed out after {}ms",
                    self.timeout_ms()
                ))),
            ),
        };

        for element in lookup.elements {
            run.state.add_schema_element(element);
        }
        run.state.examples = lookup.examples;

        let mut output = format!(
            "source={} tables=[{}] elements={} examples={}",
            lookup.source.as_str(),
            run.state.retrieved_tables().join(", "),
            run.state.retrieved_schema().len(),
            run.state.examples.len()
        );
        if let Some(error) = &lookup.degraded {
            output.push_str(&format!("; RetrievalFailure: {}", error));
        }

        let input = if entities.is_empty() {
            question
        } else {
            format!("{} | entities=[{}]", question, entities.join(", "))
        };
        run.trace(Step::SchemaLookup, input, output).await;

        routing::after_schema_lookup(&run.state, self.settings.explore)
    }

    async fn explore(&self, run: &mut Run) -> Step {
        let probes = self.exploration_probes(&run.state);

        if probes.is_empty() {
            run.trace(Step::Explore, "no probes", "skipped: every entity names a schema object")
                .await;
            return then(Step::Explore);
        }

        let mut findings = Vec::new();
        let mut errors = 0;
        let count = probes.len();

        for probe in probes {
            match self.run_probe(&probe.sql).await {
                Ok(values) if !values.is_empty() => findings.push(ExplorationFinding {
                    term: probe.term,
                    table: probe.table,
                    column: probe.column,
                    values,
                }),
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, sql = %probe.sql, "Exploration probe failed");
                    errors += 1;
                    if !e.is_retryable() {
                        break;
                    }
                }
            }
        }

        let summary = findings
            .iter()
            .map(|f| format!("{} -> {}.{} ({})", f.term, f.table, f.column, f.values.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        run.trace(
            Step::Explore,
            format!("{} probe(s) for [{}]", count, run.state.entities.join(", ")),
            format!(
                "{} finding(s){}{}",
                findings.len(),
                if summary.is_empty() { String::new() } else { format!(": {}", summary) },
                if errors > 0 { format!("; {} probe(s) failed", errors) } else { String::new() }
            ),
        )
        .await;
        run.state.exploration = findings;

        then(Step::Explore)
    }

    async fn plan(&self, run: &mut Run) -> Step {
        if run.state.complexity == Complexity::Simple {
            run.state.plan = None;
            run.trace(Step::Plan, "complexity=SIMPLE", "skipped").await;
            return then(Step::Plan);
        }

        let schema = self.schema_context(&run.state);
        let request = prompts::plan(
            run.state.question(),
            &schema,
            &run.state.examples,
            &run.state.exploration,
            self.settings.temperature,
        );

        let input = format!("complexity={}", label(&run.state.complexity));
        match self.complete("plan", request).await {
            Ok(plan) if !plan.trim().is_empty() => {
                let plan = plan.trim().to_string();
                run.state.plan = Some(plan.clone());
                run.trace(Step::Plan, input, plan).await;
            }
            Ok(_) => {
                run.state.plan = None;
                run.trace(Step::Plan, input, "skipped: empty plan").await;
            }
            Err(e) => {
                warn!(error = %e, "Planning failed, generating without a plan");
                run.state.plan = None;
                run.trace(Step::Plan, input, format!("skipped: {}", e)).await;
            }
        }

        then(Step::Plan)
    }

    async fn generate(&self, run: &mut Run) -> Step {
        run.state.attempt_count += 1;
        let attempt = run.state.attempt_count;
        let recovering = run.state.last_failure().is_some();

        let schema = self.schema_context(&run.state);
        let request = prompts::generate(
            &GenerationContext {
                question: run.state.question(),
                schema: &schema,
                plan: run.state.plan.as_deref(),
                examples: &run.state.examples,
                exploration: &run.state.exploration,
                previous_failure: run.state.last_failure(),
            },
            self.settings.temperature,
        );

        let input = match run.state.last_failure() {
            Some(failure) => format!("attempt {} (recovering from: {})", attempt, failure.message),
            None => format!("attempt {}", attempt),
        };

        match self.complete("generate", request).await {
            Ok(reply) => {
                let sql = extract_sql(&reply);
                if sql.is_empty() {
                    record_attempt(FailureStage::Generation.as_str(), "empty");
                    run.state.record_failure(FailureStage::Generation, "model returned no SQL");
                    run.trace(Step::Generate, input, "no SQL returned").await;
                    return routing::retry_or_fail(&run.state, self.budget());
                }

                debug!(attempt, recovering, sql = %sql, "Generated SQL");
                run.state.set_candidate_sql(sql.clone());
                run.trace(Step::Generate, input, sql).await;
                then(Step::Generate)
            }
            Err(e) if e.is_timeout() || matches!(e, DomainError::MalformedResponse { .. }) => {
                warn!(attempt, error = %e, "Generation failed");
                record_attempt(FailureStage::Generation.as_str(), "error");
                run.state.record_failure(FailureStage::Generation, e.to_string());
                run.trace(Step::Generate, input, format!("error: {}", e)).await;
                routing::retry_or_fail(&run.state, self.budget())
            }
            Err(e) => self.abort(run, Step::Generate, "llm", e.to_string()).await,
        }
    }

    async fn validate(&self, run: &mut Run) -> Step {
        let sql = run.state.sql().unwrap_or_default().to_string();
        let verdict = self.validator.validate(&sql);

        let output = match &verdict {
            ValidationVerdict::Ok { sanitized_sql } => {
                record_attempt(FailureStage::Validation.as_str(), "ok");
                let output = if sanitized_sql != sql.trim() {
                    format!("ok, rewritten: {}", sanitized_sql)
                } else {
                    "ok".to_string()
                };
                run.state.accept_sanitized_sql(sanitized_sql.clone());
                output
            }
            ValidationVerdict::Rejected(rejection) => {
                warn!(attempt = run.state.attempt_count, reason = %rejection.reason, "SQL rejected");
                record_attempt(FailureStage::Validation.as_str(), "rejected");
                run.state.record_failure(FailureStage::Validation, rejection.to_string());
                format!("rejected: {}", rejection)
            }
        };

        run.state.validation_result = Some(verdict);
        run.trace(Step::Validate, sql, output).await;
        routing::after_validate(&run.state, self.budget())
    }

    async fn execute(&self, run: &mut Run) -> Step {
        let sql = run.state.sql().unwrap_or_default().to_string();

        let result = match tokio::time::timeout(self.settings.step_timeout, self.executor.execute(&sql)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::timeout(self.timeout_ms())),
        };

        match result {
            Ok(rows) => {
                record_attempt(FailureStage::Execution.as_str(), "ok");
                let output = format!(
                    "{} row(s){}",
                    rows.row_count,
                    if rows.truncated { ", truncated at row cap" } else { "" }
                );
                run.state.set_execution_result(ExecutionOutcome::Rows(rows));
                run.trace(Step::Execute, sql, output).await;
            }
            Err(e) if !e.is_retryable() => {
                record_attempt(FailureStage::Execution.as_str(), "unavailable");
                return self.abort(run, Step::Execute, "database", e.to_string()).await;
            }
            Err(e) => {
                warn!(attempt = run.state.attempt_count, kind = ?e.kind, error = %e, "Execution failed");
                record_attempt(FailureStage::Execution.as_str(), "error");
                run.state.record_failure(FailureStage::Execution, e.to_string());
                let output = format!("error: {}", e);
                run.state.set_execution_result(ExecutionOutcome::Error(e));
                run.trace(Step::Execute, sql, output).await;
            }
        }

        routing::after_execute(&run.state, self.budget())
    }

    async fn answer(&self, run: &mut Run) -> Step {
        let Some(rows) = run.state.rows().cloned() else {
            run.state.final_answer = Some(prompts::NO_RESULTS_MESSAGE.to_string());
            run.trace(Step::Answer, "no result", prompts::NO_RESULTS_MESSAGE).await;
            return then(Step::Answer);
        };

        let input = format!("{} row(s)", rows.row_count);

        if rows.is_empty() {
            run.state.final_answer = Some(prompts::NO_RESULTS_MESSAGE.to_string());
            run.trace(Step::Answer, input, prompts::NO_RESULTS_MESSAGE).await;
            return then(Step::Answer);
        }

        let preview_rows = self.settings.answer_preview_rows;
        let request = prompts::answer(
            run.state.question(),
            run.state.sql().unwrap_or_default(),
            &rows,
            preview_rows,
            self.settings.temperature,
        );

        let answer = match self.complete("answer", request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => prompts::result_summary(&rows, preview_rows),
            Err(e) => {
                warn!(error = %e, "Answer synthesis failed, using a result summary");
                prompts::result_summary(&rows, preview_rows)
            }
        };

        run.state.final_answer = Some(answer.clone());
        run.trace(Step::Answer, input, answer).await;
        then(Step::Answer)
    }

    async fn visualize(&self, run: &mut Run) -> Step {
        let chart = run
            .state
            .rows()
            .and_then(|rows| plan_chart(rows, run.state.question(), self.settings.chart_max_rows));

        let input = run
            .state
            .rows()
            .map(|rows| format!("{} column(s), {} row(s)", rows.columns.len(), rows.row_count))
            .unwrap_or_default();
        let output = match &chart {
            Some(spec) => format!("{} chart of {} by {}", label(&spec.kind), spec.y.join(", "), spec.x),
            None => "skipped: result shape is not chartable".to_string(),
        };

        run.state.chart = chart;
        run.outcome = Some(RunOutcome::Answered);
        run.trace(Step::Visualize, input, output).await;
        then(Step::Visualize)
    }

    async fn fail(&self, run: &mut Run) -> Step {
        let attempts = run.state.attempt_count;

        let failure = match run.state.failure.clone() {
            Some(failure) => failure,
            None => {
                let last_error = run
                    .state
                    .last_failure()
                    .map(|f| f.message.clone())
                    .unwrap_or_else(|| "no attempt succeeded".to_string());
                let failure = RunFailure::retry_exhausted(run.state.question(), attempts, last_error);
                run.state.failure = Some(failure.clone());
                failure
            }
        };

        let explanation = prompts::failure_explanation(&failure.to_string(), &run.state.failures);
        run.state.final_answer = Some(explanation);
        run.outcome = Some(RunOutcome::Failed);
        run.trace(Step::Fail, format!("{} attempt(s)", attempts), failure.to_string())
            .await;

        then(Step::Fail)
    }

    async fn cancel(&self, run: &mut Run, step: Step) {
        info!(step = step.name(), "Run cancelled");
        run.state.final_answer = Some("The run was cancelled before it completed.".to_string());
        run.outcome = Some(RunOutcome::Cancelled);
        run.trace(step, "cancellation requested", "cancelled").await;
    }

    /// A collaborator a step cannot do without is unreachable
    async fn abort(&self, run: &mut Run, step: Step, service: &str, error: String) -> Step {
        warn!(step = step.name(), service, error = %error, "Collaborator unavailable");
        run.state.failure = Some(RunFailure::unavailable(
            run.state.question(),
            run.state.attempt_count,
            service,
            error.clone(),
        ));
        run.trace(step, service, format!("unavailable: {}", error)).await;
        Step::Fail
    }

    async fn complete(&self, operation: &str, request: LlmRequest) -> Result<String, DomainError> {
        let call = self.llm.chat(&self.settings.model, request);

        match tokio::time::timeout(self.settings.step_timeout, call).await {
            Ok(result) => result.map(|response| response.content().to_string()),
            Err(_) => Err(DomainError::timeout(operation, self.timeout_ms())),
        }
    }

    async fn run_probe(&self, sql: &str) -> Result<Vec<String>, ExecutionError> {
        let sql = match self.validator.validate(sql) {
            ValidationVerdict::Ok { sanitized_sql } => sanitized_sql,
            ValidationVerdict::Rejected(rejection) => {
                return Err(ExecutionError::permission(rejection.to_string()));
            }
        };

        let rows = match tokio::time::timeout(self.settings.step_timeout, self.executor.execute(&sql)).await {
            Ok(result) => result?,
            Err(_) => return Err(ExecutionError::timeout(self.timeout_ms())),
        };

        Ok(rows
            .rows
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|value| match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect())
    }

    /// Probes for entities that do not already name a table or column
    fn exploration_probes(&self, state: &WorkflowState) -> Vec<Probe> {
        let tables = state.retrieved_tables();
        let mut probes = Vec::new();

        for term in state.entities.iter().filter(|e| !self.names_schema_object(e)) {
            for table in tables.iter().filter_map(|name| self.catalog.table(name)) {
                for column in table.columns.iter().filter(|c| c.is_textual() && !c.primary_key) {
                    if probes.len() == self.settings.max_explore_probes {
                        return probes;
                    }
                    probes.push(Probe {
                        term: term.clone(),
                        table: table.name.clone(),
                        column: column.name.clone(),
                        sql: format!(
                            "SELECT DISTINCT {col} FROM {table} WHERE {col} LIKE {pattern} ESCAPE '\\' LIMIT {limit}",
                            col = quote_identifier(&column.name),
                            table = quote_identifier(&table.name),
                            pattern = contains_pattern(term),
                            limit = EXPLORE_VALUE_LIMIT,
                        ),
                    });
                }
            }
        }

        probes
    }

    fn names_schema_object(&self, term: &str) -> bool {
        let lower = term.trim().to_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        let matches = |name: &str| name.eq_ignore_ascii_case(&lower) || name.eq_ignore_ascii_case(singular);

        self.catalog
            .tables
            .iter()
            .any(|t| matches(&t.name) || t.columns.iter().any(|c| matches(&c.name)))
    }

    /// Prompt schema: the retrieved tables, or the whole catalog when nothing was retrieved
    fn schema_context(&self, state: &WorkflowState) -> String {
        let tables = state.retrieved_tables();
        if tables.is_empty() {
            self.catalog.render_all()
        } else {
            self.catalog.render_tables(&tables)
        }
    }

    fn budget(&self) -> u32 {
        self.settings.attempt_budget()
    }

    fn timeout_ms(&self) -> u64 {
        duration_ms(self.settings.step_timeout)
    }
}

fn then(step: Step) -> Step {
    routing::next_fixed(step).unwrap_or(Step::Done)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quoted LIKE pattern matching `term` anywhere, with `\` escaping its wildcards
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('\'', "''");
    format!("'%{}%'", escaped)
}

/// Upper-case label of a unit enum, e.g. `NORMAL`
fn label<T: std::fmt::Debug>(value: &T) -> String {
    format!("{:?}", value).to_uppercase()
}
