//! Questions about the database structure, answered from the SQLite data dictionary

use serde::{Deserialize, Serialize};

use crate::domain::catalog::SchemaCatalog;

const USER_TABLES: &str = "type = 'table' AND name NOT LIKE 'sqlite_%'";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "table", rename_all = "snake_case")]
pub enum MetaQuery {
    ListTables,
    CountTables,
    CountColumns,
    CountTableColumns(String),
    DescribeTable(String),
}

impl MetaQuery {
    /// Pick the introspection query a meta question asks for; unknown shapes list tables
    pub fn from_question(question: &str, catalog: &SchemaCatalog) -> Self {
        let lower = question.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .collect();
        let has = |w: &str| words.iter().any(|word| *word == w);
        let counting = lower.contains("how many") || has("count") || has("number");

        let names_table = |name: &str| {
            words.iter().any(|w| {
                w.eq_ignore_ascii_case(name)
                    || w.strip_suffix('s').is_some_and(|singular| singular.eq_ignore_ascii_case(name))
            })
        };
        let named_table = catalog.tables.iter().find(|t| names_table(&t.name));
        let about_columns = has("column") || has("columns") || has("fields");

        if let Some(table) = named_table {
            if counting && about_columns {
                return Self::CountTableColumns(table.name.clone());
            }
            if about_columns || has("describe") || has("schema") || has("structure") {
                return Self::DescribeTable(table.name.clone());
            }
        }

        if counting && about_columns {
            return Self::CountColumns;
        }

        if counting && (has("table") || has("tables")) {
            return Self::CountTables;
        }

        Self::ListTables
    }

    pub fn sql(&self) -> String {
        match self {
            Self::ListTables => format!(
                "SELECT name FROM sqlite_master WHERE {} ORDER BY name",
                USER_TABLES
            ),
            Self::CountTables => format!(
                "SELECT COUNT(*) AS table_count FROM sqlite_master WHERE {}",
                USER_TABLES
            ),
            Self::CountColumns => format!(
                "SELECT m.name AS table_name, COUNT(p.name) AS column_count \
                 FROM sqlite_master AS m, pragma_table_info(m.name) AS p \
                 WHERE m.{} GROUP BY m.name ORDER BY m.name",
                USER_TABLES.replace(" AND name", " AND m.name")
            ),
            Self::CountTableColumns(table) => format!(
                "SELECT COUNT(*) AS column_count FROM pragma_table_info({})",
                quote_literal(table)
            ),
            Self::DescribeTable(table) => format!(
                "SELECT name, type, pk FROM pragma_table_info({})",
                quote_literal(table)
            ),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::ListTables => "list tables".to_string(),
            Self::CountTables => "count tables".to_string(),
            Self::CountColumns => "count columns per table".to_string(),
            Self::CountTableColumns(table) => format!("count columns of {}", table),
            Self::DescribeTable(table) => format!("describe table {}", table),
        }
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
