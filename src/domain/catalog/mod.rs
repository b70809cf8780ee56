//! Schema catalog: static description of the target database

mod element;

pub use element::{SchemaElement, SchemaElementKind};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub not_null: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary_key: false,
            not_null: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// SQLite type affinity is TEXT for CHAR, CLOB and TEXT declarations
    pub fn is_textual(&self) -> bool {
        let ty = self.data_type.to_uppercase();
        ty.contains("CHAR") || ty.contains("TEXT") || ty.contains("CLOB")
    }
}

/// Foreign key from one column to another table's column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// A table and its columns, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_foreign_key(
        mut self,
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
        });
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// One-line DDL-like rendering used in prompts
    pub fn render(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut col = format!("{} {}", c.name, c.data_type);
                if c.primary_key {
                    col.push_str(" PRIMARY KEY");
                }
                if let Some(fk) = self.foreign_keys.iter().find(|fk| fk.column == c.name) {
                    col.push_str(&format!(" REFERENCES {}({})", fk.ref_table, fk.ref_column));
                }
                col
            })
            .collect();

        format!("{}({})", self.name, columns.join(", "))
    }
}

/// Read-only description of every table of one database, loaded once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Embeddable elements: every table followed by its columns, in catalog order.
    /// Vectors are empty until the index builder fills them in.
    pub fn elements(&self) -> Vec<SchemaElement> {
        let mut elements = Vec::new();

        for table in &self.tables {
            elements.push(SchemaElement::table(table));
            for column in &table.columns {
                elements.push(SchemaElement::column(table, column));
            }
        }

        elements
    }

    /// Prompt context for the named tables, in catalog order
    pub fn render_tables<S: AsRef<str>>(&self, names: &[S]) -> String {
        self.tables
            .iter()
            .filter(|t| names.iter().any(|n| n.as_ref().eq_ignore_ascii_case(&t.name)))
            .map(TableSchema::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_all(&self) -> String {
        self.tables
            .iter()
            .map(TableSchema::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// SHA-256 over the canonical JSON form; changes whenever a table, column or key changes
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A slice of the Chinook sample database
    pub fn chinook() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            TableSchema::new(
                "Album",
                vec![
                    ColumnSchema::new("AlbumId", "INTEGER").primary_key(),
                    ColumnSchema::new("Title", "NVARCHAR(160)"),
                    ColumnSchema::new("ArtistId", "INTEGER"),
                ],
            )
            .with_foreign_key("ArtistId", "Artist", "ArtistId"),
            TableSchema::new(
                "Artist",
                vec![
                    ColumnSchema::new("ArtistId", "INTEGER").primary_key(),
                    ColumnSchema::new("Name", "NVARCHAR(120)"),
                ],
            ),
            TableSchema::new(
                "Customer",
                vec![
                    ColumnSchema::new("CustomerId", "INTEGER").primary_key(),
                    ColumnSchema::new("FirstName", "NVARCHAR(40)"),
                    ColumnSchema::new("LastName", "NVARCHAR(20)"),
                    ColumnSchema::new("Country", "NVARCHAR(40)"),
                ],
            ),
            TableSchema::new(
                "Genre",
                vec![
                    ColumnSchema::new("GenreId", "INTEGER").primary_key(),
                    ColumnSchema::new("Name", "NVARCHAR(120)"),
                ],
            ),
            TableSchema::new(
                "Invoice",
                vec![
                    ColumnSchema::new("InvoiceId", "INTEGER").primary_key(),
                    ColumnSchema::new("CustomerId", "INTEGER"),
                    ColumnSchema::new("InvoiceDate", "DATETIME"),
                    ColumnSchema::new("Total", "NUMERIC(10,2)"),
                ],
            )
            .with_foreign_key("CustomerId", "Customer", "CustomerId"),
            TableSchema::new(
                "Track",
                vec![
                    ColumnSchema::new("TrackId", "INTEGER").primary_key(),
                    ColumnSchema::new("Name", "NVARCHAR(200)"),
                    ColumnSchema::new("AlbumId", "INTEGER"),
                    ColumnSchema::new("GenreId", "INTEGER"),
                    ColumnSchema::new("Milliseconds", "INTEGER"),
                ],
            )
            .with_foreign_key("AlbumId", "Album", "AlbumId")
            .with_foreign_key("GenreId", "Genre", "GenreId"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::chinook;
    use super::*;

    #[test]
    fn test_table_lookup_is_case_insensitive() {
        let catalog = chinook();
        assert_eq!(catalog.table("artist").map(|t| t.name.as_str()), Some("Artist"));
        assert!(catalog.table("Playlist").is_none());
    }

    #[test]
    fn test_elements_follow_catalog_order() {
        let catalog = chinook();
        let elements = catalog.elements();

        assert_eq!(elements[0].id, "table:Album");
        assert_eq!(elements[1].id, "column:Album.AlbumId");
        assert_eq!(elements[4].id, "table:Artist");
        assert_eq!(elements.len(), 6 + 20);
    }

    #[test]
    fn test_render_table_includes_keys() {
        let catalog = chinook();
        let rendered = catalog.render_tables(&["Album"]);
        assert_eq!(
            rendered,
            "Album(AlbumId INTEGER PRIMARY KEY, Title NVARCHAR(160), ArtistId INTEGER REFERENCES Artist(ArtistId))"
        );
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let catalog = chinook();
        assert_eq!(catalog.fingerprint(), chinook().fingerprint());
        assert_eq!(catalog.fingerprint().len(), 64);

        let mut changed = chinook();
        changed.tables[1].columns.push(ColumnSchema::new("Country", "TEXT"));
        assert_ne!(catalog.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_textual_columns() {
        assert!(ColumnSchema::new("Name", "NVARCHAR(120)").is_textual());
        assert!(ColumnSchema::new("Notes", "text").is_textual());
        assert!(!ColumnSchema::new("Total", "NUMERIC(10,2)").is_textual());
    }
}
