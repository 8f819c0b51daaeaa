//! Query-related data models.
//!
//! `SqlValue` is the tagged value every driver row is decoded into, and `RowSet`
//! is a fully materialized result. `RowSet::records` turns a result into the
//! ordered, string-keyed records returned to the client.

use crate::error::{DbError, DbResult};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// One output record. Key order follows the driver's column order.
pub type Record = serde_json::Map<String, JsonValue>;

/// Dynamically typed column value, chosen by inspecting the driver's column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// JSON documents, arrays and other structured values.
    Json(JsonValue),
}

static NULL: SqlValue = SqlValue::Null;

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// External representation. Byte arrays become text.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::UInt(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string())),
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::Bytes(v) => JsonValue::String(decode_binary_text(v)),
            Self::Json(v) => v.clone(),
        }
    }

    /// Text form of the value, `None` for SQL NULL.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(v) => Some(v.clone()),
            Self::Bytes(v) => Some(decode_binary_text(v)),
            Self::Json(JsonValue::String(v)) => Some(v.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Boolean view. MySQL reports `CASE ... THEN true` as an integer.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            Self::UInt(v) => Some(*v != 0),
            Self::Text(_) | Self::Bytes(_) => {
                match self.as_text()?.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "1" => Some(true),
                    "false" | "f" | "no" | "n" | "0" => Some(false),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Float(v) => Some(v.trunc() as i64),
            Self::Text(_) | Self::Bytes(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric view. DECIMAL columns arrive as text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            Self::Text(_) | Self::Bytes(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "{}", decode_binary_text(v)),
            Self::Json(JsonValue::String(v)) => write!(f, "{}", v),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Decode binary data as UTF-8 text, falling back to base64 when it is not valid UTF-8.
pub fn decode_binary_text(bytes: &[u8]) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => STANDARD.encode(bytes),
    }
}

/// A fully materialized query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Column names in driver order.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(|values| RowView {
            columns: &self.columns,
            values,
        })
    }

    pub fn first(&self) -> Option<RowView<'_>> {
        self.iter().next()
    }

    /// First column of the first row, or NULL for an empty result.
    pub fn scalar(&self) -> &SqlValue {
        self.rows.first().and_then(|r| r.first()).unwrap_or(&NULL)
    }

    /// Convert into external records, keyed by column name in driver order.
    pub fn records(&self) -> DbResult<Vec<Record>> {
        self.rows
            .iter()
            .map(|values| {
                if values.len() != self.columns.len() {
                    return Err(DbError::marshal(format!(
                        "row has {} values but {} columns were reported",
                        values.len(),
                        self.columns.len()
                    )));
                }
                Ok(self
                    .columns
                    .iter()
                    .zip(values)
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect())
            })
            .collect()
    }
}

/// Borrowed view of one row with by-name column lookup.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a [SqlValue],
}

impl<'a> RowView<'a> {
    /// Value of the named column, case-insensitive. Missing columns read as NULL.
    pub fn get(&self, name: &str) -> &'a SqlValue {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
            .unwrap_or(&NULL)
    }

    pub fn at(&self, idx: usize) -> &'a SqlValue {
        self.values.get(idx).unwrap_or(&NULL)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).as_text()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).as_bool().unwrap_or(false)
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [SqlValue] {
        self.values
    }
}

/// Intent of a SQL statement, read from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    /// SELECT or SHOW
    Read,
    /// INSERT/UPDATE/DELETE/DDL and anything unrecognized
    Write,
    /// DROP DATABASE, DROP SCHEMA, TRUNCATE
    Forbidden,
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Forbidden => write!(f, "forbidden"),
        }
    }
}
