//! Warehouse client abstraction
//!
//! Every SQL statement the service issues goes through [`Warehouse::query`]. Statements
//! carry SQL text with `:name` parameter markers plus typed values; each backend decides
//! how to bind them. Rows come back as [`Record`]s so the converters never depend on
//! which backend produced them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::Result;
use crate::time::{format_timestamp, parse_timestamp};

pub(crate) mod databricks;
mod sqlite;

pub use databricks::{normalize_host, DatabricksWarehouse, WarehouseSettings};
pub use sqlite::SqliteWarehouse;

/// SQL flavour spoken by a warehouse backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Databricks,
    Sqlite,
}

impl Dialect {
    /// Random ordering function
    pub fn random_fn(&self) -> &'static str {
        match self {
            Dialect::Databricks => "RAND()",
            Dialect::Sqlite => "RANDOM()",
        }
    }

    /// Statement listing the columns of `table`
    pub fn describe_table(&self, table: &str) -> String {
        match self {
            Dialect::Databricks => format!("DESCRIBE TABLE {}", table),
            Dialect::Sqlite => format!("PRAGMA table_info({})", table),
        }
    }
}

/// Warehouse connection used by the review service
#[async_trait]
pub trait Warehouse: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run one statement and return its rows in warehouse order
    async fn query(&self, statement: &Statement) -> Result<Vec<Record>>;

    /// Run a statement whose rows are not needed
    async fn execute(&self, statement: &Statement) -> Result<()> {
        self.query(statement).await.map(|_| ())
    }
}

/// Typed parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Literal form used when a statement is rendered for logs
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => quote_literal(s),
            SqlValue::Timestamp(ts) => quote_literal(&format_timestamp(ts)),
        }
    }
}

/// Single-quote a string literal, doubling embedded quotes
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// SQL text plus named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind a value to `:name`; rebinding replaces the earlier value
    pub fn bind(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name.to_string(), value)),
        }
        self
    }

    pub fn param(&self, name: &str) -> Option<&SqlValue> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Positions and names of `:name` markers, skipping quoted text and `::` casts
    pub fn markers(&self) -> Vec<Marker> {
        scan_markers(&self.sql)
    }

    /// SQL with every bound marker replaced by its literal, for logging
    pub fn render_inline(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut last = 0;
        for marker in self.markers() {
            out.push_str(&self.sql[last..marker.start]);
            match self.param(&marker.name) {
                Some(value) => out.push_str(&value.to_sql_literal()),
                None => out.push_str(&self.sql[marker.start..marker.end]),
            }
            last = marker.end;
        }
        out.push_str(&self.sql[last..]);
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_inline())
    }
}

/// A `:name` marker located in SQL text (byte offsets, `start` at the colon)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub start: usize,
    pub end: usize,
    pub name: String,
}

fn scan_markers(sql: &str) -> Vec<Marker> {
    let bytes = sql.as_bytes();
    let mut markers = Vec::new();
    let mut in_quote = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            if b == b'\'' {
                in_quote = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' => {
                in_quote = true;
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' => {
                let start = i;
                let mut end = i + 1;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                    end += 1;
                }
                let begins_with_letter = end > start + 1
                    && (bytes[start + 1].is_ascii_alphabetic() || bytes[start + 1] == b'_');
                if begins_with_letter {
                    markers.push(Marker {
                        start,
                        end,
                        name: sql[start + 1..end].to_string(),
                    });
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    markers
}

/// One result row: column names in select order with their JSON values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw value; JSON null is reported as absent
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    }

    pub fn str(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn bool(&self, column: &str) -> Option<bool> {
        match self.get(column)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer value; fractional values are truncated
    pub fn i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
            }
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn f64(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match self.get(column)? {
            Value::String(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

/// Serializes as a JSON object in column order
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Validate a possibly catalog/schema-qualified table name before it is spliced into SQL
pub fn is_valid_table_name(name: &str) -> bool {
    let segments: Vec<&str> = name.split('.').collect();
    !name.is_empty()
        && name.len() < 256
        && segments.len() <= 3
        && segments.iter().all(|seg| {
            !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_inline_escapes_quotes() {
        let stmt = Statement::new("SELECT * FROM t WHERE a = :a AND b = :b AND c = :c")
            .bind("a", "it's")
            .bind("b", SqlValue::Null)
            .bind("c", 3i64);
        assert_eq!(
            stmt.render_inline(),
            "SELECT * FROM t WHERE a = 'it''s' AND b = NULL AND c = 3"
        );
    }

    #[test]
    fn test_markers_skip_literals_and_casts() {
        let stmt = Statement::new("SELECT ':x', a::int, :real_one FROM t WHERE t = '10:30'");
        let names: Vec<String> = stmt.markers().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["real_one".to_string()]);
    }

    #[test]
    fn test_bind_replaces_existing() {
        let stmt = Statement::new("SELECT :a").bind("a", 1i64).bind("a", 2i64);
        assert_eq!(stmt.params.len(), 1);
        assert_eq!(stmt.param("a"), Some(&SqlValue::Int(2)));
    }

    #[test]
    fn test_option_binds_null() {
        let none: Option<String> = None;
        assert!(SqlValue::from(none).is_null());
        assert_eq!(SqlValue::from(Some(true)), SqlValue::Bool(true));
    }

    #[test]
    fn test_record_coerces_string_values() {
        let rec = Record::new()
            .with("score", "0.75")
            .with("count", "3")
            .with("flag", "true")
            .with("gone", Value::Null);
        assert_eq!(rec.f64("score"), Some(0.75));
        assert_eq!(rec.i64("count"), Some(3));
        assert_eq!(rec.bool("flag"), Some(true));
        assert!(rec.str("gone").is_none());
        assert!(rec.str("missing").is_none());
    }

    #[test]
    fn test_record_coerces_native_values() {
        let rec = Record::new()
            .with("score", json!(-0.6))
            .with("count", json!(2.9))
            .with("flag", json!(0))
            .with("id", json!(42));
        assert_eq!(rec.f64("score"), Some(-0.6));
        assert_eq!(rec.i64("count"), Some(2));
        assert_eq!(rec.bool("flag"), Some(false));
        assert_eq!(rec.str("id").as_deref(), Some("42"));
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("reviews"));
        assert!(is_valid_table_name("main.default.survey_rows"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("a..b"));
        assert!(!is_valid_table_name("t; DROP TABLE x"));
        assert!(!is_valid_table_name("a.b.c.d"));
    }

    #[test]
    fn test_record_serializes_in_column_order() {
        let rec = Record::new().with("b", json!(1)).with("a", json!(null));
        assert_eq!(serde_json::to_string(&rec).unwrap(), r#"{"b":1,"a":null}"#);
    }
}
