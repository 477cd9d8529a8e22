//! SQLite-backed store using an `sqlx` connection pool.

use crate::error::{StoreError, StoreResult};
use crate::row::{validate_identifier, Conditions, Row, SelectOptions};
use crate::schema::{SCHEMA_VERSION, STATEMENTS, UPGRADES};
use crate::store::Store;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// A [`Store`] persisting to a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    healthy: AtomicBool,
}

impl SqliteStore {
    /// Connects to `url` (e.g. `sqlite://warden.db`), creating the file if missing,
    /// and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        info!("Connecting to database: {}", url);
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        Self::connect_with(options, max_connections).await
    }

    /// Opens the database file at `path`, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::connect_with(options, 5).await
    }

    async fn connect_with(options: SqliteConnectOptions, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            healthy: AtomicBool::new(true),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Creates missing tables and records the schema version.
    async fn initialize_schema(&self) -> StoreResult<()> {
        let current_version: Option<i32> = sqlx::query_scalar(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None);

        match current_version {
            Some(version) if version >= SCHEMA_VERSION => {
                debug!("Database schema is up to date (version {})", version);
                return Ok(());
            }
            Some(version) => {
                info!("Upgrading database schema from version {} to {}", version, SCHEMA_VERSION);
            }
            None => {
                info!("Creating initial database schema (version {})", SCHEMA_VERSION);
            }
        }

        for statement in STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        if let Some(version) = current_version {
            for (_, statement) in UPGRADES.iter().filter(|(introduced, _)| *introduced > version) {
                sqlx::query(statement).execute(&self.pool).await?;
            }
        }

        sqlx::query("INSERT OR REPLACE INTO schema_version (version) VALUES (?)")
            .bind(SCHEMA_VERSION)
            .execute(&self.pool)
            .await?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Closes the pool; later operations report the store unavailable.
    pub async fn close(&self) {
        self.pool.close().await;
        self.healthy.store(false, Ordering::SeqCst);
    }

    /// Records the outcome of an operation in the health flag.
    fn track<T>(&self, result: Result<T, sqlx::Error>) -> StoreResult<T> {
        match result {
            Ok(value) => {
                self.healthy.store(true, Ordering::SeqCst);
                Ok(value)
            }
            Err(err) => {
                let err = StoreError::from(err);
                if err.is_unavailable() {
                    warn!("Database became unavailable");
                    self.healthy.store(false, Ordering::SeqCst);
                }
                Err(err)
            }
        }
    }

    async fn fetch(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let rows = self.track(query.fetch_all(&self.pool).await)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> StoreResult<sqlx::sqlite::SqliteQueryResult> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        self.track(query.execute(&self.pool).await)
    }
}

fn where_clause(conditions: &Conditions, params: &mut Vec<Value>) -> StoreResult<String> {
    if conditions.is_empty() {
        return Ok(String::new());
    }
    let mut clauses = Vec::new();
    for (column, value) in conditions.iter() {
        clauses.push(format!("{} = ?", validate_identifier(column)?));
        params.push(value.clone());
    }
    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn decode_row(row: &SqliteRow) -> StoreResult<Row> {
    let mut out = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => Value::from(row.try_get::<f64, _>(index)?),
                "BLOB" => Value::Null,
                _ => Value::String(row.try_get::<String, _>(index)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[async_trait]
impl Store for SqliteStore {
    async fn select(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &SelectOptions,
    ) -> StoreResult<Vec<Row>> {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT * FROM {}{}",
            validate_identifier(table)?,
            where_clause(conditions, &mut params)?
        );
        if let Some((column, order)) = &options.order_by {
            sql.push_str(&format!(" ORDER BY {} {}", validate_identifier(column)?, order.as_sql()));
        }
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.fetch(&sql, &params).await
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<i64> {
        if row.is_empty() {
            let sql = format!("INSERT INTO {} DEFAULT VALUES", validate_identifier(table)?);
            return Ok(self.execute(&sql, &[]).await?.last_insert_rowid());
        }
        let mut columns = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len());
        for (column, value) in row {
            columns.push(validate_identifier(&column)?.to_string());
            params.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            validate_identifier(table)?,
            columns.join(", "),
            placeholders
        );
        Ok(self.execute(&sql, &params).await?.last_insert_rowid())
    }

    async fn update(&self, table: &str, row: Row, id: i64) -> StoreResult<u64> {
        let mut assignments = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len() + 1);
        for (column, value) in row {
            if column == "id" {
                continue;
            }
            assignments.push(format!("{} = ?", validate_identifier(&column)?));
            params.push(value);
        }
        if assignments.is_empty() {
            return Ok(0);
        }
        params.push(Value::from(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            validate_identifier(table)?,
            assignments.join(", ")
        );
        Ok(self.execute(&sql, &params).await?.rows_affected())
    }

    async fn delete(&self, table: &str, conditions: &Conditions) -> StoreResult<u64> {
        if conditions.is_empty() {
            return Err(StoreError::InvalidQuery("delete without conditions".to_string()));
        }
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}",
            validate_identifier(table)?,
            where_clause(conditions, &mut params)?
        );
        Ok(self.execute(&sql, &params).await?.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        self.fetch(sql, params).await
    }

    async fn increment(
        &self,
        table: &str,
        key: &Conditions,
        column: &str,
        amount: i64,
    ) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidQuery("increment without key".to_string()));
        }
        let column = validate_identifier(column)?;
        let mut key_columns = Vec::new();
        let mut params = Vec::new();
        for (name, value) in key.iter() {
            key_columns.push(validate_identifier(name)?.to_string());
            params.push(value.clone());
        }
        params.push(Value::from(amount));

        let insert_columns = key_columns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; key_columns.len() + 1].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({insert_columns}) VALUES ({placeholders}) \
             ON CONFLICT ({conflict}) DO UPDATE SET {column} = {column} + excluded.{column}",
            table = validate_identifier(table)?,
            conflict = key_columns.join(", "),
        );
        self.execute(&sql, &params).await?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.pool.is_closed() && self.healthy.load(Ordering::SeqCst)
    }
}
