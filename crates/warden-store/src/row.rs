//! Row representation and typed accessors.
//!
//! Rows travel as JSON objects so every store implementation shares one
//! shape. Snowflake ids are stored as strings (they do not fit `i64` in
//! general); timestamps are RFC 3339 strings.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::str::FromStr;

/// One row of a table, keyed by column name.
pub type Row = Map<String, Value>;

/// Encodes a snowflake id for storage.
pub fn id_value(id: impl std::fmt::Display) -> Value {
    Value::String(id.to_string())
}

/// Equality filters joined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions(Vec<(String, Value)>);

impl Conditions {
    /// An empty filter matching every row.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a `column = value` clause.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((column.into(), value.into()));
        self
    }

    /// Iterates over the `(column, value)` clauses.
    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    /// Whether no clause was added.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `row` satisfies every clause.
    pub fn matches(&self, row: &Row) -> bool {
        self.0
            .iter()
            .all(|(column, expected)| row.get(column).is_some_and(|actual| values_equal(actual, expected)))
    }
}

/// Sort direction for [`SelectOptions::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortOrder {
    /// SQL keyword for this direction.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Ordering and paging for a select.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Column and direction to sort by.
    pub order_by: Option<(String, SortOrder)>,
    /// Maximum number of rows returned.
    pub limit: Option<usize>,
}

impl SelectOptions {
    /// Sorts by `column` in `order`.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }

    /// Caps the number of returned rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Rejects table and column names that could smuggle SQL.
pub fn validate_identifier(name: &str) -> StoreResult<&str> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Compares two stored values, treating numeric strings and numbers alike.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Bool(x), Value::Number(y)) | (Value::Number(y), Value::Bool(x)) => {
            y.as_i64() == Some(i64::from(*x))
        }
        _ => a == b,
    }
}

/// Total-ish ordering used by the in-memory store for `ORDER BY`.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Typed accessors over [`Row`].
pub trait RowExt {
    /// Integer column; accepts numbers and numeric strings.
    fn get_i64(&self, column: &str) -> StoreResult<i64>;
    /// Integer column defaulting to zero when absent or null.
    fn get_i64_or_zero(&self, column: &str) -> i64;
    /// Text column.
    fn get_str(&self, column: &str) -> StoreResult<&str>;
    /// Optional text column.
    fn get_opt_str(&self, column: &str) -> Option<&str>;
    /// Boolean column; accepts booleans and 0/1 integers.
    fn get_bool(&self, column: &str) -> StoreResult<bool>;
    /// Snowflake id column stored as text or integer.
    fn get_id<T: FromStr>(&self, column: &str) -> StoreResult<T>;
    /// RFC 3339 timestamp column.
    fn get_datetime(&self, column: &str) -> StoreResult<DateTime<Utc>>;
    /// Optional RFC 3339 timestamp column.
    fn get_opt_datetime(&self, column: &str) -> StoreResult<Option<DateTime<Utc>>>;
    /// List of strings stored either as a JSON array or as JSON text.
    fn get_string_list(&self, column: &str) -> StoreResult<Vec<String>>;
}

impl RowExt for Row {
    fn get_i64(&self, column: &str) -> StoreResult<i64> {
        match self.get(column) {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| StoreError::decode(column, "not an integer")),
            Some(Value::Bool(b)) => Ok(i64::from(*b)),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| StoreError::decode(column, "not an integer")),
            Some(_) => Err(StoreError::decode(column, "not an integer")),
            None => Err(StoreError::decode(column, "missing")),
        }
    }

    fn get_i64_or_zero(&self, column: &str) -> i64 {
        self.get_i64(column).unwrap_or(0)
    }

    fn get_str(&self, column: &str) -> StoreResult<&str> {
        self.get_opt_str(column)
            .ok_or_else(|| StoreError::decode(column, "missing or not text"))
    }

    fn get_opt_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    fn get_bool(&self, column: &str) -> StoreResult<bool> {
        match self.get(column) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) != 0),
            Some(Value::String(s)) => match s.as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(StoreError::decode(column, "not a boolean")),
            },
            Some(_) => Err(StoreError::decode(column, "not a boolean")),
            None => Err(StoreError::decode(column, "missing")),
        }
    }

    fn get_id<T: FromStr>(&self, column: &str) -> StoreResult<T> {
        let raw = match self.get(column) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(StoreError::decode(column, "missing id")),
        };
        raw.parse()
            .map_err(|_| StoreError::decode(column, format!("invalid id '{raw}'")))
    }

    fn get_datetime(&self, column: &str) -> StoreResult<DateTime<Utc>> {
        self.get_opt_datetime(column)?
            .ok_or_else(|| StoreError::decode(column, "missing timestamp"))
    }

    fn get_opt_datetime(&self, column: &str) -> StoreResult<Option<DateTime<Utc>>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| StoreError::decode(column, e.to_string())),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(Some)
                .ok_or_else(|| StoreError::decode(column, "timestamp out of range")),
            Some(_) => Err(StoreError::decode(column, "not a timestamp")),
        }
    }

    fn get_string_list(&self, column: &str) -> StoreResult<Vec<String>> {
        let parsed;
        let array = match self.get(column) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(Value::String(text)) => {
                parsed = serde_json::from_str::<Value>(text)
                    .map_err(|e| StoreError::decode(column, e.to_string()))?;
                match &parsed {
                    Value::Array(items) => items,
                    _ => return Err(StoreError::decode(column, "not a list")),
                }
            }
            Some(_) => return Err(StoreError::decode(column, "not a list")),
        };

        Ok(array
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("user_roles").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("users; DROP TABLE x").is_err());
    }

    #[test]
    fn test_conditions_match_numbers_and_bools() {
        let r = row(json!({"user_id": "42", "is_active": 1, "count": 3}));

        assert!(Conditions::new().eq("user_id", "42").matches(&r));
        assert!(Conditions::new().eq("is_active", true).matches(&r));
        assert!(Conditions::new().eq("count", 3.0).matches(&r));
        assert!(!Conditions::new().eq("user_id", "43").matches(&r));
        assert!(!Conditions::new().eq("missing", "x").matches(&r));
        assert!(Conditions::new().matches(&r));
    }

    #[test]
    fn test_typed_accessors() {
        let r = row(json!({
            "id": 7,
            "user_id": "987654321098765432",
            "flag": 0,
            "when": "2024-03-01T10:00:00Z",
            "none": null,
            "keywords": "[\"spam\",\"scam\"]",
            "list": ["a", "b"]
        }));

        assert_eq!(r.get_i64("id").unwrap(), 7);
        assert_eq!(r.get_id::<u64>("user_id").unwrap(), 987_654_321_098_765_432);
        assert!(!r.get_bool("flag").unwrap());
        assert_eq!(r.get_datetime("when").unwrap().to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert_eq!(r.get_opt_datetime("none").unwrap(), None);
        assert_eq!(r.get_string_list("keywords").unwrap(), vec!["spam", "scam"]);
        assert_eq!(r.get_string_list("list").unwrap(), vec!["a", "b"]);
        assert_eq!(r.get_i64_or_zero("absent"), 0);
        assert!(r.get_str("absent").is_err());
    }

    #[test]
    fn test_compare_values_orders_nulls_first() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
    }
}
