use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Number, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, ValueRef};
use tracing::{debug, info, instrument};

use crate::config::DatabaseConfig;
use crate::domain::catalog::{ColumnSchema, SchemaCatalog, TableSchema};
use crate::domain::database::{ExecutionError, QueryExecutor, QueryRows};
use crate::domain::DomainError;

/// Read-only executor over a SQLite database file.
///
/// The connection is opened read-only and statements that do not start with SELECT or
/// WITH are refused before they reach SQLite, whatever the validator decided.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
    row_cap: usize,
    query_timeout: Duration,
}

impl SqliteExecutor {
    pub async fn connect(config: &DatabaseConfig, row_cap: u64) -> Result<Self, DomainError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DomainError::configuration(format!("Invalid database url '{}': {}", config.url, e)))?;

        Self::connect_with(
            options,
            config.max_connections,
            row_cap,
            Duration::from_millis(config.query_timeout_ms),
        )
        .await
    }

    pub async fn connect_with(
        options: SqliteConnectOptions,
        max_connections: u32,
        row_cap: u64,
        query_timeout: Duration,
    ) -> Result<Self, DomainError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options.read_only(true))
            .await
            .map_err(|e| DomainError::unavailable("sqlite", e.to_string()))?;

        info!(row_cap, "Connected to SQLite (read-only)");

        Ok(Self {
            pool,
            row_cap: row_cap as usize,
            query_timeout,
        })
    }

    /// Tables, columns and foreign keys from the data dictionary, ordered by table name
    #[instrument(skip(self))]
    pub async fn load_catalog(&self) -> Result<SchemaCatalog, DomainError> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list tables: {}", e)))?;

        let mut tables = Vec::with_capacity(names.len());
        for (name,) in names {
            let columns: Vec<(String, String, i64, i64)> = sqlx::query_as(
                "SELECT name, type, pk, \"notnull\" FROM pragma_table_info(?) ORDER BY cid",
            )
            .bind(&name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read columns of {}: {}", name, e)))?;

            let foreign_keys: Vec<(String, String, Option<String>)> = sqlx::query_as(
                "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?) ORDER BY id, seq",
            )
            .bind(&name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read keys of {}: {}", name, e)))?;

            let mut table = TableSchema::new(
                name.clone(),
                columns
                    .into_iter()
                    .map(|(column, data_type, pk, not_null)| ColumnSchema {
                        name: column,
                        data_type,
                        primary_key: pk > 0,
                        not_null: not_null != 0 || pk > 0,
                    })
                    .collect(),
            );
            for (column, ref_table, ref_column) in foreign_keys {
                table = table.with_foreign_key(column, ref_table, ref_column.unwrap_or_default());
            }

            tables.push(table);
        }

        debug!(tables = tables.len(), "Loaded schema catalog");
        Ok(SchemaCatalog::new(tables))
    }

    async fn fetch_capped(&self, sql: &str) -> Result<QueryRows, ExecutionError> {
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        let mut truncated = false;

        while let Some(row) = stream.try_next().await.map_err(map_sqlx_error)? {
            if columns.is_empty() {
                columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            if rows.len() == self.row_cap {
                truncated = true;
                break;
            }
            rows.push(decode_row(&row));
        }
        drop(stream);

        // no row to read names from
        if columns.is_empty() {
            let statement = self.pool.prepare(sql).await.map_err(map_sqlx_error)?;
            columns = statement.columns().iter().map(|c| c.name().to_string()).collect();
        }

        Ok(QueryRows::new(columns, rows).truncated(truncated))
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    #[instrument(skip(self), fields(row_cap = self.row_cap))]
    async fn execute(&self, sql: &str) -> Result<QueryRows, ExecutionError> {
        if !is_read_statement(sql) {
            return Err(ExecutionError::permission(
                "only SELECT or WITH statements may be executed",
            ));
        }

        let timeout_ms = self.query_timeout.as_millis() as u64;
        let result = tokio::time::timeout(self.query_timeout, self.fetch_capped(sql))
            .await
            .map_err(|_| ExecutionError::timeout(timeout_ms))??;

        debug!(rows = result.row_count, truncated = result.truncated, "Query executed");
        Ok(result)
    }
}

/// First keyword after leading whitespace, comments and parentheses
fn is_read_statement(sql: &str) -> bool {
    let mut rest = sql.trim_start();
    loop {
        if let Some(stripped) = rest.strip_prefix("--") {
            rest = stripped.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(stripped) = rest.strip_prefix("/*") {
            rest = stripped.split_once("*/").map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(stripped) = rest.strip_prefix('(') {
            rest = stripped.trim_start();
        } else {
            break;
        }
    }

    let keyword: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase();

    keyword == "SELECT" || keyword == "WITH"
}

fn decode_row(row: &SqliteRow) -> Vec<Value> {
    (0..row.columns().len()).map(|i| decode_value(row, i)).collect()
}

fn decode_value(row: &SqliteRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Value::String(format!("<blob {} bytes>", v.len()));
    }

    Value::Null
}

fn map_sqlx_error(error: sqlx::Error) -> ExecutionError {
    match error {
        sqlx::Error::Database(db) => ExecutionError::classify(db.message()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            ExecutionError::connection(error.to_string())
        }
        other => ExecutionError::classify(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::database::ExecutionErrorKind;

    async fn seeded_executor(row_cap: u64) -> SqliteExecutor {
        let path = std::env::temp_dir().join(format!("pmp-sql-agent-{}.db", uuid::Uuid::new_v4()));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let setup = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .unwrap();
        for statement in [
            "CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY, Name NVARCHAR(120))",
            "CREATE TABLE Album (AlbumId INTEGER PRIMARY KEY, Title NVARCHAR(160) NOT NULL, \
             ArtistId INTEGER NOT NULL REFERENCES Artist(ArtistId))",
            "INSERT INTO Artist VALUES (1, 'AC/DC'), (2, 'Accept'), (3, 'Aerosmith')",
            "INSERT INTO Album VALUES (1, 'For Those About To Rock', 1), (2, 'Let There Be Rock', 1), \
             (3, 'Balls to the Wall', 2)",
        ] {
            sqlx::query(statement).execute(&setup).await.unwrap();
        }
        setup.close().await;

        SqliteExecutor::connect_with(options, 2, row_cap, Duration::from_secs(5))
            .await
            .unwrap()
    }

    #[test]
    fn test_read_statement_detection() {
        assert!(is_read_statement("SELECT 1"));
        assert!(is_read_statement("  -- top artists\n with t AS (SELECT 1) SELECT * FROM t"));
        assert!(is_read_statement("/* c */ (SELECT 1)"));
        assert!(!is_read_statement("DELETE FROM Artist"));
        assert!(!is_read_statement("-- SELECT\nDROP TABLE Artist"));
    }

    #[tokio::test]
    async fn test_load_catalog() {
        let executor = seeded_executor(1000).await;
        let catalog = executor.load_catalog().await.unwrap();

        assert_eq!(catalog.table_names(), vec!["Album", "Artist"]);
        let album = catalog.table("Album").unwrap();
        assert_eq!(album.columns.len(), 3);
        assert!(album.columns[0].primary_key);
        assert_eq!(album.foreign_keys[0].ref_table, "Artist");
        assert_eq!(album.foreign_keys[0].ref_column, "ArtistId");
    }

    #[tokio::test]
    async fn test_execute_decodes_values() {
        let executor = seeded_executor(1000).await;
        let rows = executor
            .execute(
                "SELECT ar.Name, COUNT(al.AlbumId) AS AlbumCount FROM Artist ar \
                 JOIN Album al ON al.ArtistId = ar.ArtistId \
                 GROUP BY ar.ArtistId ORDER BY AlbumCount DESC LIMIT 1",
            )
            .await
            .unwrap();

        assert_eq!(rows.columns, vec!["Name", "AlbumCount"]);
        assert_eq!(rows.row_count, 1);
        assert_eq!(rows.rows[0], vec![Value::from("AC/DC"), Value::from(2)]);
    }

    #[tokio::test]
    async fn test_row_cap_truncates() {
        let executor = seeded_executor(2).await;
        let rows = executor.execute("SELECT Name FROM Artist ORDER BY ArtistId").await.unwrap();

        assert_eq!(rows.row_count, 2);
        assert!(rows.truncated);
    }

    #[tokio::test]
    async fn test_missing_column_is_classified() {
        let executor = seeded_executor(1000).await;
        let err = executor.execute("SELECT Title FROM Artist").await.unwrap_err();

        assert_eq!(err.kind, ExecutionErrorKind::MissingObject);
        assert!(err.message.contains("no such column"));
    }

    #[tokio::test]
    async fn test_writes_refused() {
        let executor = seeded_executor(1000).await;

        let err = executor.execute("DELETE FROM Artist").await.unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Permission);

        // read-only connection backs up the keyword guard
        let err = executor
            .execute("WITH x AS (SELECT 1) INSERT INTO Artist (Name) SELECT 'x' FROM x")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Permission);

        let rows = executor.execute("SELECT COUNT(*) AS n FROM Artist").await.unwrap();
        assert_eq!(rows.rows[0][0], Value::from(3));
    }

    #[tokio::test]
    async fn test_empty_result() {
        let executor = seeded_executor(1000).await;
        let rows = executor
            .execute("SELECT Name FROM Artist WHERE Name = 'Nobody'")
            .await
            .unwrap();

        assert!(rows.is_empty());
        assert_eq!(rows.row_count, 0);
        assert_eq!(rows.columns, vec!["Name".to_string()]);

        let rows = executor
            .execute("SELECT ArtistId AS id, Name FROM Artist WHERE ArtistId > 100")
            .await
            .unwrap();
        assert_eq!(rows.columns, vec!["id".to_string(), "Name".to_string()]);
    }
}
