//! SQLite syntax the stock sqlparser dialect does not cover

use std::ops::ControlFlow;

use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, Ident, ObjectName, Offset, OffsetRows, Query, SetExpr, Statement,
    TableFactor, UnaryOperator, VisitMut, VisitorMut,
};
use sqlparser::dialect::{Dialect, SQLiteDialect};
use sqlparser::keywords::Keyword;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, Tokenizer};

/// Same binding strength the parser gives LIKE
const GLOB_PREC: u8 = 19;

/// Statement verbs that change data, schema or attached databases
const WRITE_VERBS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "UPSERT", "MERGE", "CREATE", "DROP", "ALTER", "TRUNCATE", "VACUUM",
    "REINDEX", "ANALYZE", "DETACH",
];

/// [`SQLiteDialect`] plus `x [NOT] GLOB pattern` and `LIMIT offset, count`.
///
/// `GLOB` parses to the equivalent `glob(pattern, x)` call. `LIMIT a, b` parses to
/// `LIMIT b OFFSET a` once [`normalize_limits`] has run over the statement.
#[derive(Debug)]
pub struct SqliteSyntax {
    base: SQLiteDialect,
}

impl Default for SqliteSyntax {
    fn default() -> Self {
        Self { base: SQLiteDialect {} }
    }
}

impl Dialect for SqliteSyntax {
    fn is_delimited_identifier_start(&self, ch: char) -> bool {
        self.base.is_delimited_identifier_start(ch)
    }

    fn is_identifier_start(&self, ch: char) -> bool {
        self.base.is_identifier_start(ch)
    }

    fn is_identifier_part(&self, ch: char) -> bool {
        self.base.is_identifier_part(ch)
    }

    fn supports_filter_during_aggregation(&self) -> bool {
        self.base.supports_filter_during_aggregation()
    }

    fn parse_statement(&self, parser: &mut Parser) -> Option<Result<Statement, ParserError>> {
        self.base.parse_statement(parser)
    }

    fn parse_prefix(&self, parser: &mut Parser) -> Option<Result<Expr, ParserError>> {
        let pair = matches!(
            (
                parser.peek_nth_token(0).token,
                parser.peek_nth_token(1).token,
                parser.peek_nth_token(2).token,
            ),
            (Token::Number(..), Token::Comma, Token::Number(..))
        );
        if !pair || !follows_limit(parser) {
            return None;
        }

        Some(limit_pair(parser))
    }

    fn get_next_precedence(&self, parser: &Parser) -> Option<Result<u8, ParserError>> {
        if glob_ahead(parser).is_some() {
            Some(Ok(GLOB_PREC))
        } else {
            None
        }
    }

    fn parse_infix(&self, parser: &mut Parser, expr: &Expr, _precedence: u8) -> Option<Result<Expr, ParserError>> {
        let negated = glob_ahead(parser)?;
        if negated {
            parser.next_token();
        }
        parser.next_token();

        Some(parser.parse_subexpr(GLOB_PREC).map(|pattern| {
            let call = glob_call(pattern, expr.clone());
            if negated {
                Expr::UnaryOp {
                    op: UnaryOperator::Not,
                    expr: Box::new(call),
                }
            } else {
                call
            }
        }))
    }
}

/// `offset, count` after LIMIT, kept as a tuple until [`normalize_limits`] splits it
fn limit_pair(parser: &mut Parser) -> Result<Expr, ParserError> {
    let offset = parser.parse_number_value()?;
    parser.expect_token(&Token::Comma)?;
    let count = parser.parse_number_value()?;
    Ok(Expr::Tuple(vec![Expr::Value(offset), Expr::Value(count)]))
}

/// `Some(negated)` when the next tokens are `GLOB` or `NOT GLOB`
fn glob_ahead(parser: &Parser) -> Option<bool> {
    if is_glob(&parser.peek_nth_token(0).token) {
        return Some(false);
    }
    let not = matches!(parser.peek_nth_token(0).token, Token::Word(ref w) if w.keyword == Keyword::NOT);
    (not && is_glob(&parser.peek_nth_token(1).token)).then_some(true)
}

fn is_glob(token: &Token) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case("glob"))
}

fn follows_limit(parser: &mut Parser) -> bool {
    if parser.index() == 0 {
        return false;
    }
    parser.prev_token();
    let previous = parser.next_token().token;
    matches!(previous, Token::Word(w) if w.keyword == Keyword::LIMIT)
}

fn glob_call(pattern: Expr, subject: Expr) -> Expr {
    Expr::Function(Function {
        name: ObjectName(vec![Ident::new("glob")]),
        args: vec![
            FunctionArg::Unnamed(FunctionArgExpr::Expr(pattern)),
            FunctionArg::Unnamed(FunctionArgExpr::Expr(subject)),
        ],
        filter: None,
        null_treatment: None,
        over: None,
        distinct: false,
        special: false,
        order_by: vec![],
    })
}

/// Rewrite every `LIMIT (offset, count)` pair left by the parser into `LIMIT count OFFSET offset`
pub fn normalize_limits(query: &mut Query) {
    split_limit(query);
    let _ = query.visit(&mut LimitPairs);
}

struct LimitPairs;

impl VisitorMut for LimitPairs {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<()> {
        match expr {
            Expr::Subquery(query) | Expr::InSubquery { subquery: query, .. } | Expr::Exists { subquery: query, .. } => {
                split_limit(query)
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<()> {
        if let TableFactor::Derived { subquery, .. } = factor {
            split_limit(subquery);
        }
        ControlFlow::Continue(())
    }
}

fn split_limit(query: &mut Query) {
    if let Some(with) = query.with.as_mut() {
        for cte in &mut with.cte_tables {
            split_limit(&mut cte.query);
        }
    }
    split_limit_in_body(&mut query.body);

    if query.offset.is_some() {
        return;
    }
    let parts = match query.limit.take() {
        Some(Expr::Tuple(parts)) if parts.len() == 2 => parts,
        other => {
            query.limit = other;
            return;
        }
    };
    let mut parts = parts.into_iter();
    if let (Some(offset), Some(count)) = (parts.next(), parts.next()) {
        query.limit = Some(count);
        query.offset = Some(Offset {
            value: offset,
            rows: OffsetRows::None,
        });
    }
}

fn split_limit_in_body(body: &mut SetExpr) {
    match body {
        SetExpr::Query(query) => split_limit(query),
        SetExpr::SetOperation { left, right, .. } => {
            split_limit_in_body(left);
            split_limit_in_body(right);
        }
        _ => {}
    }
}

/// Main verb of text the parser could not read, when it is a write or maintenance keyword.
///
/// The verb is the first top-level `SELECT`, `VALUES` or write keyword, so
/// `WITH t AS (...) DELETE ...` reports `DELETE`.
pub fn unparsed_write_verb(sql: &str) -> Option<String> {
    let tokens = Tokenizer::new(&SqliteSyntax::default(), sql).tokenize().ok()?;
    let mut depth = 0usize;

    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(word) if depth == 0 && word.quote_style.is_none() => {
                let verb = word.value.to_uppercase();
                if verb == "SELECT" || verb == "VALUES" {
                    return None;
                }
                if WRITE_VERBS.contains(&verb.as_str()) {
                    return Some(verb);
                }
            }
            _ => {}
        }
    }

    None
}
