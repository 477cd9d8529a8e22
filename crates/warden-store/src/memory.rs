//! In-memory store used by tests and single-process deployments.

use crate::error::{StoreError, StoreResult};
use crate::row::{compare_values, validate_identifier, Conditions, Row, SelectOptions, SortOrder};
use crate::store::Store;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracing::debug;

/// A [`Store`] that keeps every table in process memory.
///
/// Availability can be toggled to exercise fail-closed paths:
/// [`set_available`](Self::set_available) flips the health flag and makes
/// every operation fail, [`set_failing`](Self::set_failing) keeps the flag
/// green while operations fail, which models a store dropping mid-request.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    next_id: AtomicI64,
    available: AtomicBool,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        }
    }

    /// Marks the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes operations fail while the health flag stays green.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of every row in `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    fn check(&self, table: &str) -> StoreResult<()> {
        if !self.available.load(Ordering::SeqCst) || self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        validate_identifier(table)?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &SelectOptions,
    ) -> StoreResult<Vec<Row>> {
        self.check(table)?;
        let tables = self.tables.read();
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| conditions.matches(r)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        if let Some((column, order)) = &options.order_by {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = options.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> StoreResult<i64> {
        self.check(table)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        row.insert("id".to_string(), Value::from(id));
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
        debug!(table, id, "Inserted row");
        Ok(id)
    }

    async fn update(&self, table: &str, row: Row, id: i64) -> StoreResult<u64> {
        self.check(table)?;
        let mut tables = self.tables.write();
        let Some(existing) = tables.get_mut(table).and_then(|rows| {
            rows.iter_mut()
                .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
        }) else {
            return Ok(0);
        };
        for (column, value) in row {
            if column != "id" {
                existing.insert(column, value);
            }
        }
        Ok(1)
    }

    async fn delete(&self, table: &str, conditions: &Conditions) -> StoreResult<u64> {
        self.check(table)?;
        if conditions.is_empty() {
            return Err(StoreError::InvalidQuery("delete without conditions".to_string()));
        }
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !conditions.matches(r));
        Ok((before - rows.len()) as u64)
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> StoreResult<Vec<Row>> {
        Err(StoreError::Unsupported(
            "raw SQL is not available on the in-memory store".to_string(),
        ))
    }

    async fn increment(
        &self,
        table: &str,
        key: &Conditions,
        column: &str,
        amount: i64,
    ) -> StoreResult<()> {
        self.check(table)?;
        validate_identifier(column)?;
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(row) = rows.iter_mut().find(|r| key.matches(r)) {
            let current = row.get(column).and_then(Value::as_i64).unwrap_or(0);
            row.insert(column.to_string(), Value::from(current + amount));
            return Ok(());
        }

        let mut row = Row::new();
        for (k, v) in key.iter() {
            row.insert(k.clone(), v.clone());
        }
        row.insert(column.to_string(), Value::from(amount));
        row.insert(
            "id".to_string(),
            Value::from(self.next_id.fetch_add(1, Ordering::SeqCst)),
        );
        rows.push(row);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
