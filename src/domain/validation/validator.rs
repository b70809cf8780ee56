use std::ops::ControlFlow;

use sqlparser::ast::{visit_expressions, visit_relations, Expr, ObjectName, Query, SetExpr, Statement, Value};
use sqlparser::parser::Parser;
use tracing::debug;

use super::dialect::{normalize_limits, unparsed_write_verb, SqliteSyntax};
use super::{RejectionReason, ValidationVerdict};

/// Row cap injected when a query has no LIMIT/FETCH of its own
pub const DEFAULT_ROW_CAP: u64 = 1000;

/// SQLite functions that reach outside the database file or load native code
const DENIED_FUNCTIONS: &[&str] = &[
    "load_extension",
    "readfile",
    "writefile",
    "edit",
    "fts3_tokenizer",
    "sqlite_dbpage",
];

/// Read-only gate for generated SQL.
///
/// Pure: the verdict depends on the text and the row cap only. Feeding a sanitized
/// statement back in yields the same sanitized statement.
#[derive(Debug, Clone)]
pub struct SqlValidator {
    row_cap: u64,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_CAP)
    }
}

impl SqlValidator {
    pub fn new(row_cap: u64) -> Self {
        Self { row_cap }
    }

    pub fn row_cap(&self) -> u64 {
        self.row_cap
    }

    pub fn validate(&self, sql: &str) -> ValidationVerdict {
        let trimmed = sql.trim().trim_end_matches(';').trim_end();
        if trimmed.is_empty() {
            return ValidationVerdict::rejected(RejectionReason::SyntaxError, "empty statement");
        }

        let mut statements = match Parser::parse_sql(&SqliteSyntax::default(), trimmed) {
            Ok(statements) => statements,
            Err(e) => {
                return match unparsed_write_verb(trimmed) {
                    Some(verb) => ValidationVerdict::rejected(
                        RejectionReason::WriteOperationForbidden,
                        format!("'{}' statements are not read-only", verb),
                    ),
                    None => ValidationVerdict::rejected(RejectionReason::SyntaxError, e.to_string()),
                };
            }
        };

        match statements.len() {
            0 => return ValidationVerdict::rejected(RejectionReason::SyntaxError, "empty statement"),
            1 => {}
            n => {
                return ValidationVerdict::rejected(
                    RejectionReason::MultipleStatements,
                    format!("expected exactly one statement, found {}", n),
                );
            }
        }

        let statement = statements.remove(0);

        let mut query = match statement {
            Statement::Query(query) => query,
            Statement::Pragma { .. } | Statement::AttachDatabase { .. } | Statement::Execute { .. } => {
                return ValidationVerdict::rejected(
                    RejectionReason::DangerousPattern,
                    format!("'{}' is not allowed", statement_keyword(trimmed)),
                );
            }
            _ => {
                return ValidationVerdict::rejected(
                    RejectionReason::WriteOperationForbidden,
                    format!("'{}' statements are not read-only", statement_keyword(trimmed)),
                );
            }
        };

        if let Some(detail) = write_in_query(&query) {
            return ValidationVerdict::rejected(RejectionReason::WriteOperationForbidden, detail);
        }

        if let Some(name) = denied_function(&query) {
            return ValidationVerdict::rejected(
                RejectionReason::DangerousPattern,
                format!("call to '{}' is not allowed", name),
            );
        }

        if query.limit.is_some() || query.fetch.is_some() {
            return ValidationVerdict::ok(trimmed);
        }

        normalize_limits(&mut query);
        query.limit = Some(Expr::Value(Value::Number(self.row_cap.to_string(), false)));
        let sanitized = query.to_string();
        debug!(row_cap = self.row_cap, "Injected row cap");

        ValidationVerdict::ok(sanitized)
    }
}

fn statement_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

/// SELECT INTO, or a data-modifying body hidden in a CTE or set operation
fn write_in_query(query: &Query) -> Option<String> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            if let Some(detail) = write_in_query(&cte.query) {
                return Some(detail);
            }
        }
    }

    write_in_set_expr(&query.body)
}

fn write_in_set_expr(body: &SetExpr) -> Option<String> {
    match body {
        SetExpr::Select(select) if select.into.is_some() => {
            Some("SELECT INTO creates a table".to_string())
        }
        SetExpr::Query(query) => write_in_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            write_in_set_expr(left).or_else(|| write_in_set_expr(right))
        }
        SetExpr::Insert(_) | SetExpr::Update(_) => {
            Some("data-modifying statement inside a query".to_string())
        }
        _ => None,
    }
}

/// Unquoted, lower-cased last part of a name: `"main"."readfile"` and `[readfile]` both give `readfile`
fn bare_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.to_lowercase())
        .unwrap_or_default()
}

fn denied_function(query: &Query) -> Option<String> {
    let denied = |name: &ObjectName| {
        let bare = bare_name(name);
        DENIED_FUNCTIONS.contains(&bare.as_str()).then_some(bare)
    };

    let found = visit_expressions(query, |expr| match expr {
        Expr::Function(f) => match denied(&f.name) {
            Some(name) => ControlFlow::Break(name),
            None => ControlFlow::Continue(()),
        },
        _ => ControlFlow::Continue(()),
    });
    if let ControlFlow::Break(name) = found {
        return Some(name);
    }

    // table-valued functions show up as relations
    match visit_relations(query, |relation| match denied(relation) {
        Some(name) => ControlFlow::Break(name),
        None => ControlFlow::Continue(()),
    }) {
        ControlFlow::Break(name) => Some(name),
        ControlFlow::Continue(()) => None,
    }
}
