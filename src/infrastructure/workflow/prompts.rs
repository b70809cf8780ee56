//! Prompt construction and the fixed user-facing messages

use crate::domain::database::QueryRows;
use crate::domain::llm::LlmRequest;
use crate::domain::retrieval::Example;
use crate::domain::workflow::{AttemptFailure, ExplorationFinding};

pub const REJECTION_MESSAGE: &str = "I can only answer questions about the data in this database. \
     Try asking about its tables, for example which artists have the most albums.";

pub const NO_RESULTS_MESSAGE: &str = "No results found.";

const UNDERSTAND_SYSTEM: &str = "You are a SQL expert. Analyze the user's question about a SQLite database.
Return a JSON object with:
- \"intent\": one of \"aggregation\", \"filtering\", \"join\", \"general\" for questions about the data; \
\"meta-query\" for questions about tables, columns or schema structure; \"irrelevant\" for questions \
unrelated to this database; \"ambiguous\" when the question cannot be answered without clarification
- \"complexity\": \"simple\", \"moderate\" or \"complex\"
- \"entities\": list of table names, columns or values mentioned or implied
- \"ambiguity\": list of vague terms that need clarification (e.g. \"best\", \"recent\" without criteria); \
empty when the question is clear
Return ONLY valid JSON.";

const PLAN_SYSTEM: &str = "You are a query planner for a text-to-SQL system. Break the question into \
logical steps before any SQL is written. For each step name the data needed, the tables to access and \
any conditions or filters. Return ONLY a numbered list.";

const GENERATE_SYSTEM: &str = "You are a SQL expert for SQLite. Write one safe, efficient query that \
answers the question using only the tables and columns in the schema.
Rules:
1. READ-ONLY: never use INSERT, UPDATE, DELETE, DROP, ALTER, ATTACH or PRAGMA.
2. Return exactly one statement.
3. Select explicit columns instead of SELECT *.
4. Use CTEs for multi-step logic.
Return ONLY the SQL query, without markdown formatting.";

const ANSWER_SYSTEM: &str = "Summarize SQL results for the user in one or two natural sentences. \
Mention the concrete names and numbers from the results. Do not mention SQL.";

pub fn understand(question: &str, tables: &[&str], temperature: f32) -> LlmRequest {
    LlmRequest::builder()
        .system(UNDERSTAND_SYSTEM)
        .user(format!(
            "Database tables: {}\n\nQuestion: \"{}\"",
            tables.join(", "),
            question
        ))
        .temperature(temperature)
        .json()
        .build()
}

pub fn plan(
    question: &str,
    schema: &str,
    examples: &[Example],
    exploration: &[ExplorationFinding],
    temperature: f32,
) -> LlmRequest {
    let mut prompt = format!("Database schema:\n{}\n", schema);
    push_examples(&mut prompt, examples);
    push_exploration(&mut prompt, exploration);
    prompt.push_str(&format!("\nQuestion: \"{}\"", question));

    LlmRequest::builder()
        .system(PLAN_SYSTEM)
        .user(prompt)
        .temperature(temperature)
        .build()
}

pub struct GenerationContext<'a> {
    pub question: &'a str,
    pub schema: &'a str,
    pub plan: Option<&'a str>,
    pub examples: &'a [Example],
    pub exploration: &'a [ExplorationFinding],
    pub previous_failure: Option<&'a AttemptFailure>,
}

pub fn generate(context: &GenerationContext<'_>, temperature: f32) -> LlmRequest {
    let mut prompt = format!("Database schema:\n{}\n", context.schema);
    push_examples(&mut prompt, context.examples);
    push_exploration(&mut prompt, context.exploration);

    prompt.push_str(&format!(
        "\nQuery plan:\n{}\n",
        context.plan.unwrap_or("No specific plan provided.")
    ));

    if let Some(failure) = context.previous_failure {
        prompt.push_str(&format!(
            "\nThe previous attempt failed {}.\nPrevious SQL:\n{}\nError message:\n{}\n\
             Correct the query so that it resolves this error.\n",
            failure.stage.describe(),
            failure.sql.as_deref().unwrap_or("(none)"),
            failure.message
        ));
    }

    prompt.push_str(&format!("\nQuestion: \"{}\"", context.question));

    LlmRequest::builder()
        .system(GENERATE_SYSTEM)
        .user(prompt)
        .temperature(temperature)
        .build()
}

pub fn answer(question: &str, sql: &str, rows: &QueryRows, preview_rows: usize, temperature: f32) -> LlmRequest {
    LlmRequest::builder()
        .system(ANSWER_SYSTEM)
        .user(format!(
            "Question: \"{}\"\nSQL: {}\nResults ({} row(s)):\n{}",
            question,
            sql,
            rows.row_count,
            rows.preview(preview_rows)
        ))
        .temperature(temperature)
        .build()
}

pub fn clarification(question: &str, ambiguity: &[String]) -> String {
    if ambiguity.is_empty() {
        return format!(
            "I'm not sure what you mean by \"{}\". Could you rephrase it with the specific data, \
             filters or time period you are interested in?",
            question
        );
    }

    let terms = ambiguity
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Your question uses terms I can't map to the data without more detail: {}. \
         Could you say what you mean, for example by which measure, limit or time period?",
        terms
    )
}

/// Deterministic answer used when synthesis is unavailable
pub fn result_summary(rows: &QueryRows, preview_rows: usize) -> String {
    format!(
        "The query returned {} row(s){}:\n{}",
        rows.row_count,
        if rows.truncated { " (truncated)" } else { "" },
        rows.preview(preview_rows)
    )
}

/// Failure explanation listing every attempted fix
pub fn failure_explanation(headline: &str, failures: &[AttemptFailure]) -> String {
    let mut text = headline.to_string();

    if !failures.is_empty() {
        text.push_str("\n\nAttempts:");
        for failure in failures {
            text.push_str(&format!(
                "\n{}. {} {}: {}",
                failure.attempt,
                failure.sql.as_deref().unwrap_or("(no SQL)"),
                failure.stage.describe(),
                failure.message
            ));
        }
    }

    text
}

fn push_examples(prompt: &mut String, examples: &[Example]) {
    if examples.is_empty() {
        return;
    }
    prompt.push_str("\nSimilar questions and their SQL:\n");
    for example in examples {
        prompt.push_str(&format!("Q: {}\nSQL: {}\n", example.question, example.sql));
    }
}

fn push_exploration(prompt: &mut String, findings: &[ExplorationFinding]) {
    if findings.is_empty() {
        return;
    }
    prompt.push_str("\nValues found in the data:\n");
    for finding in findings {
        prompt.push_str(&format!(
            "- \"{}\" matches {}.{}: {}\n",
            finding.term,
            finding.table,
            finding.column,
            finding.values.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::FailureStage;
    use serde_json::json;

    #[test]
    fn test_generate_includes_previous_error() {
        let failure = AttemptFailure {
            attempt: 1,
            stage: FailureStage::Execution,
            sql: Some("SELECT Title FROM Artist".into()),
            message: "no such column: Title".into(),
        };
        let request = generate(
            &GenerationContext {
                question: "List artist names",
                schema: "Artist(ArtistId INTEGER PRIMARY KEY, Name NVARCHAR(120))",
                plan: None,
                examples: &[],
                exploration: &[],
                previous_failure: Some(&failure),
            },
            0.0,
        );

        let text = request.user_text();
        assert!(text.contains("SELECT Title FROM Artist"));
        assert!(text.contains("no such column: Title"));
        assert!(text.contains("No specific plan provided."));
    }

    #[test]
    fn test_clarification_names_terms() {
        let text = clarification("Who are the best customers?", &["best".into()]);
        assert!(text.contains("\"best\""));
    }

    #[test]
    fn test_failure_explanation_lists_attempts() {
        let failures = vec![
            AttemptFailure {
                attempt: 1,
                stage: FailureStage::Validation,
                sql: Some("DELETE FROM Track".into()),
                message: "WRITE_OPERATION_FORBIDDEN: DELETE is not allowed".into(),
            },
            AttemptFailure {
                attempt: 2,
                stage: FailureStage::Execution,
                sql: Some("SELECT Foo FROM Track".into()),
                message: "no such column: Foo".into(),
            },
        ];

        let text = failure_explanation("Could not answer.", &failures);
        assert!(text.starts_with("Could not answer."));
        assert!(text.contains("1. DELETE FROM Track"));
        assert!(text.contains("2. SELECT Foo FROM Track"));
    }

    #[test]
    fn test_result_summary() {
        let rows = QueryRows::new(vec!["Name".into()], vec![vec![json!("Rock")]]);
        assert_eq!(result_summary(&rows, 5), "The query returned 1 row(s):\nName\nRock");
    }
}
