//! Driver row decoding.
//!
//! Rows coming out of sqlx are turned into [`SqlValue`]s by inspecting each
//! column's reported type at runtime.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! A value whose type no decoder understands comes back as the text the server
//! sent for it. Only SQL NULL becomes [`SqlValue::Null`].

use crate::models::{RowSet, SqlValue};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

/// Timestamp layout used for every temporal value.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Temporal,
    Array,
    Unknown,
}

/// Exact integer type names. MySQL may append `UNSIGNED`.
const INTEGER_TYPES: &[&str] = &[
    "int", "int2", "int4", "int8", "integer", "smallint", "bigint", "tinyint", "mediumint",
    "serial", "serial2", "serial4", "serial8", "smallserial", "bigserial", "oid",
];

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.ends_with("[]") {
        return TypeCategory::Array;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    let base = lower.strip_suffix(" unsigned").unwrap_or(&lower);
    if INTEGER_TYPES.contains(&base) {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("timestamp")
        || lower.contains("datetime")
        || lower == "date"
        || lower == "time"
        || lower == "timetz"
    {
        return TypeCategory::Temporal;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" || lower == "enum" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Trait for converting driver rows to tagged values.
pub trait RowToValues {
    fn column_names(&self) -> Vec<String>;
    fn to_values(&self) -> Vec<SqlValue>;
}

impl RowToValues for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> Vec<SqlValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                mysql::decode_column(self, idx, type_name, categorize_type(type_name))
            })
            .collect()
    }
}

impl RowToValues for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> Vec<SqlValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                postgres::decode_column(self, idx, type_name, categorize_type(type_name))
            })
            .collect()
    }
}

/// Materialize driver rows into a [`RowSet`].
pub fn to_row_set<R: RowToValues>(rows: &[R]) -> RowSet {
    let columns = rows.first().map(|r| r.column_names()).unwrap_or_default();
    RowSet::new(columns, rows.iter().map(|r| r.to_values()).collect())
}

/// Decode column `idx` as `T`. `None` means the driver refused the type.
fn typed<'r, R, T>(row: &'r R, idx: usize, wrap: impl FnOnce(T) -> SqlValue) -> Option<SqlValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx)
        .ok()
        .map(|v| v.map(wrap).unwrap_or(SqlValue::Null))
}

/// Last resort for values no typed decoder accepted: the raw text the server
/// sent, then the raw bytes. Only a real SQL NULL becomes `Null`.
fn raw_fallback<R>(row: &R, idx: usize, type_name: &str) -> SqlValue
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(column = idx, type_name, error = %e, "Column missing from row");
            return SqlValue::Null;
        }
    }
    if let Ok(text) = row.try_get_unchecked::<String, _>(idx) {
        tracing::debug!(column = idx, type_name, "Returning column as raw text");
        return SqlValue::Text(text);
    }
    if let Ok(bytes) = row.try_get_unchecked::<Vec<u8>, _>(idx) {
        return SqlValue::Bytes(bytes);
    }
    tracing::warn!(column = idx, type_name, "Undecodable column value, returning NULL");
    SqlValue::Null
}

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> SqlValue {
        let decoded = match category {
            TypeCategory::Decimal => typed(row, idx, |d: RawDecimal| SqlValue::Text(d.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => typed(row, idx, SqlValue::Bool),
            TypeCategory::Float => typed(row, idx, SqlValue::Float)
                .or_else(|| typed(row, idx, |v: f32| SqlValue::Float(v.into()))),
            TypeCategory::Binary => typed(row, idx, SqlValue::Bytes),
            TypeCategory::Json => typed(row, idx, SqlValue::Json),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => typed(row, idx, SqlValue::Text),
        };
        // information_schema columns are sometimes reported with a binary collation
        decoded.unwrap_or_else(|| raw_fallback(row, idx, type_name))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<SqlValue> {
        typed(row, idx, |v: i8| SqlValue::Int(v.into()))
            .or_else(|| typed(row, idx, |v: i16| SqlValue::Int(v.into())))
            .or_else(|| typed(row, idx, |v: i32| SqlValue::Int(v.into())))
            .or_else(|| typed(row, idx, SqlValue::Int))
            .or_else(|| typed(row, idx, |v: u8| SqlValue::UInt(v.into())))
            .or_else(|| typed(row, idx, |v: u16| SqlValue::UInt(v.into())))
            .or_else(|| typed(row, idx, |v: u32| SqlValue::UInt(v.into())))
            .or_else(|| typed(row, idx, SqlValue::UInt))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Option<SqlValue> {
        typed(row, idx, |t: chrono::DateTime<chrono::Utc>| {
            SqlValue::Text(t.format(TIMESTAMP_FORMAT).to_string())
        })
        .or_else(|| {
            typed(row, idx, |t: chrono::NaiveDateTime| {
                SqlValue::Text(t.format(TIMESTAMP_FORMAT).to_string())
            })
        })
        .or_else(|| typed(row, idx, |t: chrono::NaiveDate| SqlValue::Text(t.to_string())))
        .or_else(|| typed(row, idx, |t: chrono::NaiveTime| SqlValue::Text(t.to_string())))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> SqlValue {
        let decoded = match category {
            TypeCategory::Decimal => typed(row, idx, |d: RawDecimal| SqlValue::Text(d.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => typed(row, idx, SqlValue::Bool),
            TypeCategory::Float => typed(row, idx, SqlValue::Float)
                .or_else(|| typed(row, idx, |v: f32| SqlValue::Float(v.into()))),
            TypeCategory::Binary => typed(row, idx, SqlValue::Bytes),
            TypeCategory::Json => typed(row, idx, SqlValue::Json),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Array => decode_array(row, idx),
            _ => typed(row, idx, SqlValue::Text),
        };
        // UUID, INTERVAL, geometric types and other arrays keep their server text
        decoded.unwrap_or_else(|| raw_fallback(row, idx, type_name))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<SqlValue> {
        typed(row, idx, |v: i16| SqlValue::Int(v.into()))
            .or_else(|| typed(row, idx, |v: i32| SqlValue::Int(v.into())))
            .or_else(|| typed(row, idx, SqlValue::Int))
            .or_else(|| typed(row, idx, |o: sqlx::postgres::types::Oid| SqlValue::UInt(o.0.into())))
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Option<SqlValue> {
        typed(row, idx, |t: chrono::DateTime<chrono::Utc>| {
            SqlValue::Text(t.format(TIMESTAMP_FORMAT).to_string())
        })
        .or_else(|| {
            typed(row, idx, |t: chrono::NaiveDateTime| {
                SqlValue::Text(t.format(TIMESTAMP_FORMAT).to_string())
            })
        })
        .or_else(|| typed(row, idx, |t: chrono::NaiveDate| SqlValue::Text(t.to_string())))
        .or_else(|| typed(row, idx, |t: chrono::NaiveTime| SqlValue::Text(t.to_string())))
    }

    fn decode_array(row: &PgRow, idx: usize) -> Option<SqlValue> {
        fn to_json<T: Into<JsonValue>>(items: Vec<T>) -> SqlValue {
            SqlValue::Json(JsonValue::Array(items.into_iter().map(Into::into).collect()))
        }

        typed(row, idx, to_json::<String>)
            .or_else(|| typed(row, idx, to_json::<i64>))
            .or_else(|| typed(row, idx, to_json::<i32>))
            .or_else(|| typed(row, idx, to_json::<f64>))
            .or_else(|| typed(row, idx, to_json::<bool>))
    }
}
