use serde::{Deserialize, Serialize};

use super::{ColumnSchema, TableSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaElementKind {
    Table,
    Column,
}

/// An embeddable piece of the catalog: a table or one of its columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaElement {
    /// `table:<Table>` or `column:<Table>.<Column>`
    pub id: String,
    pub kind: SchemaElementKind,
    /// Owning table (the table itself for table elements)
    pub table: String,
    pub name: String,
    /// Text that gets embedded
    pub description: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl SchemaElement {
    pub fn table(table: &TableSchema) -> Self {
        let columns: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        let mut description = format!("table {} with columns {}", table.name, columns.join(", "));
        for fk in &table.foreign_keys {
            description.push_str(&format!("; {} references {}", fk.column, fk.ref_table));
        }

        Self {
            id: format!("table:{}", table.name),
            kind: SchemaElementKind::Table,
            table: table.name.clone(),
            name: table.name.clone(),
            description,
            embedding: Vec::new(),
        }
    }

    pub fn column(table: &TableSchema, column: &ColumnSchema) -> Self {
        Self {
            id: format!("column:{}.{}", table.name, column.name),
            kind: SchemaElementKind::Column,
            table: table.name.clone(),
            name: column.name.clone(),
            description: format!(
                "column {} of table {} ({})",
                column.name, table.name, column.data_type
            ),
            embedding: Vec::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn is_table(&self) -> bool {
        self.kind == SchemaElementKind::Table
    }
}
