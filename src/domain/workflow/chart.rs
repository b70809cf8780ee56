use serde::{Deserialize, Serialize};

use crate::domain::database::QueryRows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

/// Renderer-agnostic chart description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: String,
    pub y: Vec<String>,
    pub title: String,
}

const TEMPORAL_HINTS: &[&str] = &["date", "month", "year", "day", "week", "quarter", "time"];

/// Chart for a result with at least two columns, one of them numeric, and 1..=max_rows rows.
/// Anything else gets no chart.
pub fn plan_chart(rows: &QueryRows, title: &str, max_rows: usize) -> Option<ChartSpec> {
    if rows.columns.len() < 2 || rows.row_count == 0 || rows.row_count > max_rows {
        return None;
    }

    let numeric: Vec<usize> = (0..rows.columns.len())
        .filter(|&i| rows.is_numeric_column(i))
        .collect();
    if numeric.is_empty() {
        return None;
    }

    let x = (0..rows.columns.len())
        .find(|i| !numeric.contains(i))
        .unwrap_or(0);
    let y: Vec<String> = numeric
        .iter()
        .filter(|&&i| i != x)
        .map(|&i| rows.columns[i].clone())
        .collect();
    if y.is_empty() {
        return None;
    }

    let x_name = rows.columns[x].clone();
    let lower = x_name.to_lowercase();
    let kind = if TEMPORAL_HINTS.iter().any(|h| lower.contains(h)) {
        ChartKind::Line
    } else {
        ChartKind::Bar
    };

    Some(ChartSpec {
        kind,
        x: x_name,
        y,
        title: title.trim().to_string(),
    })
}
