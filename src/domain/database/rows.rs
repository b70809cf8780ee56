use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tabular result of one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// Rows beyond the cap were dropped
    #[serde(default)]
    pub truncated: bool,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            truncated: false,
        }
    }

    pub fn truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// A column is numeric when every non-null value in it is a number and at least one is present
    pub fn is_numeric_column(&self, index: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            match row.get(index) {
                Some(Value::Number(_)) => seen = true,
                Some(Value::Null) | None => {}
                Some(_) => return false,
            }
        }
        seen
    }

    /// Plain-text table of the first `limit` rows
    pub fn preview(&self, limit: usize) -> String {
        let mut lines = vec![self.columns.join(" | ")];
        for row in self.rows.iter().take(limit) {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            lines.push(cells.join(" | "));
        }
        if self.row_count > limit {
            lines.push(format!("... ({} rows total)", self.row_count));
        }
        lines.join("\n")
    }
}

pub(crate) fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
