//! Schema-related data models.
//!
//! Output value objects of the metadata introspector. They are assembled fresh per
//! call and never mutated afterwards.

use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

/// Schemas that never appear in an unfiltered table listing, across both dialects.
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "information_schema",
    "pg_catalog",
    "mysql",
    "performance_schema",
    "sys",
];

/// Sentinel for statistics that could not be read.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct TableInfo {
    /// Table or view name
    pub name: String,
    /// Schema (PostgreSQL) or database (MySQL) containing the table
    pub schema: String,
    /// "table", "view", or the lower-cased type reported by the server
    #[serde(rename = "type")]
    pub table_type: String,
}

impl TableInfo {
    pub fn new(
        name: impl Into<String>,
        schema: impl Into<String>,
        raw_type: impl AsRef<str>,
    ) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            table_type: normalize_table_type(raw_type.as_ref()),
        }
    }

    pub fn is_system(&self) -> bool {
        is_system_schema(&self.schema)
    }
}

pub fn is_system_schema(schema: &str) -> bool {
    SYSTEM_SCHEMAS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(schema))
}

/// Map `information_schema.tables.table_type` onto the values the tool reports.
pub fn normalize_table_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("base table") {
        "table".to_string()
    } else if lower.contains("view") {
        "view".to_string()
    } else {
        lower
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Data type of the column
    pub data_type: String,
    /// Whether the column can contain NULL values
    pub is_nullable: bool,
    /// Whether the column is part of the primary key
    pub is_primary_key: bool,
    /// Default value expression, omitted when the column has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Maximum length for character types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_max_length: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct IndexInfo {
    /// Index name
    pub name: String,
    /// Columns included in the index, in key order
    pub columns: Vec<String>,
    /// Whether the index is unique
    pub is_unique: bool,
}

/// Columns and indexes of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct TableDescription {
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
    /// Indexes ordered by name
    pub indexes: Vec<IndexInfo>,
}

/// Split an index column list.
///
/// Postgres reports `{a,b}` array literals and MySQL reports `a,b` from
/// `GROUP_CONCAT`; both are handled the same way.
pub fn parse_index_columns(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TableStats {
    pub table_name: String,
    /// Exact row count from `COUNT(*)`
    pub row_count: i64,
    /// Table plus index size, human readable, or "N/A"
    pub total_size: String,
    /// Heap size, human readable, or "N/A"
    pub table_size: String,
    /// Index size, human readable, or "N/A"
    pub index_size: String,
    /// Last ANALYZE time, "<timestamp> (auto)", "Never", "N/A" or "N/A (MySQL)"
    pub last_analyzed: String,
    /// Nullability ("Nullable" / "Not Null") of up to five columns
    pub column_stats: BTreeMap<String, String>,
}

impl TableStats {
    pub fn new(table_name: impl Into<String>, row_count: i64) -> Self {
        Self {
            table_name: table_name.into(),
            row_count,
            total_size: NOT_AVAILABLE.to_string(),
            table_size: NOT_AVAILABLE.to_string(),
            index_size: NOT_AVAILABLE.to_string(),
            last_analyzed: NOT_AVAILABLE.to_string(),
            column_stats: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct DbInfo {
    /// Name of the connected database
    pub database_name: String,
    /// Server version, e.g. "PostgreSQL 16.2" or "MySQL 8.0.36"
    pub version: String,
    /// Non-system schemas
    pub schemas: Vec<String>,
    /// Number of tables and views outside the system schemas
    pub table_count: i64,
}
