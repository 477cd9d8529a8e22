//! The store trait implemented by every backend.

use crate::error::StoreResult;
use crate::row::{Conditions, Row, SelectOptions};
use async_trait::async_trait;
use serde_json::Value;

/// Query/insert/update interface over a relational store.
///
/// Callers check [`is_available`](Store::is_available) before assuming the
/// store is responsive; every operation may still fail with
/// [`StoreError::Unavailable`](crate::StoreError::Unavailable).
#[async_trait]
pub trait Store: Send + Sync {
    /// Rows of `table` matching `conditions`.
    async fn select(
        &self,
        table: &str,
        conditions: &Conditions,
        options: &SelectOptions,
    ) -> StoreResult<Vec<Row>>;

    /// Inserts `row` and returns its generated id.
    async fn insert(&self, table: &str, row: Row) -> StoreResult<i64>;

    /// Overwrites the given columns of the row with primary key `id`.
    /// Returns the number of affected rows.
    async fn update(&self, table: &str, row: Row, id: i64) -> StoreResult<u64>;

    /// Deletes rows matching `conditions`; an empty filter is rejected.
    async fn delete(&self, table: &str, conditions: &Conditions) -> StoreResult<u64>;

    /// Runs a raw statement with positional parameters.
    async fn query(&self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>>;

    /// Adds `amount` to `column` of the row identified by `key`, creating
    /// the row with `column = amount` when it does not exist yet. Atomic.
    async fn increment(
        &self,
        table: &str,
        key: &Conditions,
        column: &str,
        amount: i64,
    ) -> StoreResult<()>;

    /// Health flag; `false` means the store is known to be unreachable.
    fn is_available(&self) -> bool;

    /// First row matching `conditions`, if any.
    async fn select_one(&self, table: &str, conditions: &Conditions) -> StoreResult<Option<Row>> {
        let mut rows = self
            .select(table, conditions, &SelectOptions::default().limit(1))
            .await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}
