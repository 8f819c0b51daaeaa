//! Schema introspection module.
//!
//! Every operation runs its query for the connection's probed dialect first and
//! retries with the other dialect's query when that fails.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! dialect. Dialect-specific implementations are in their respective submodules
//! (postgres, mysql), each providing the same interface over `&dyn DbConnection`.

use crate::db::connection::{ActiveConnection, DbConnection};
use crate::db::dialect::{Dialect, with_fallback};
use crate::error::DbResult;
use crate::models::{
    ColumnInfo, DbInfo, IndexInfo, NOT_AVAILABLE, RowSet, RowView, SqlValue, TableDescription,
    TableInfo, TableStats, parse_index_columns,
};
use serde_json::Value as JsonValue;
use tracing::debug;

/// Column stats are reported for at most this many columns.
pub const COLUMN_STATS_LIMIT: usize = 5;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List tables and views, excluding system schemas unless `schema` names one.
    pub async fn list_tables(
        conn: &ActiveConnection,
        schema: Option<&str>,
    ) -> DbResult<Vec<TableInfo>> {
        let db = conn.handle();
        let schema = schema.filter(|s| !s.is_empty());
        let primary = conn.dialect().await;

        let set = with_fallback("list_tables", primary, |dialect| async move {
            match (dialect, schema) {
                (Dialect::Postgres, Some(s)) => db.fetch(queries::postgres::LIST_TABLES_IN_SCHEMA, &[s]).await,
                (Dialect::Postgres, None) => db.fetch(queries::postgres::LIST_TABLES, &[]).await,
                (Dialect::MySql, Some(s)) => db.fetch(queries::mysql::LIST_TABLES_IN_SCHEMA, &[s]).await,
                (Dialect::MySql, None) => db.fetch(queries::mysql::LIST_TABLES, &[]).await,
            }
        })
        .await?;

        let tables: Vec<TableInfo> = set
            .iter()
            .map(|row| {
                TableInfo::new(
                    row.text("name").unwrap_or_default(),
                    row.text("schema_name").unwrap_or_default(),
                    row.text("table_type").unwrap_or_default(),
                )
            })
            .filter(|t| schema.is_some() || !t.is_system())
            .collect();

        debug!(connection = %conn.name(), count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Pick the schema to inspect.
    ///
    /// An explicit schema wins. Otherwise `SELECT DATABASE()` names it on MySQL;
    /// on Postgres that query fails and `fallback` is used.
    pub async fn resolve_schema(
        conn: &ActiveConnection,
        schema: Option<&str>,
        fallback: &str,
    ) -> String {
        if let Some(s) = schema.filter(|s| !s.is_empty()) {
            return s.to_string();
        }
        match conn.handle().fetch(queries::CURRENT_DATABASE, &[]).await {
            Ok(set) => set
                .scalar()
                .as_text()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
            Err(e) => {
                debug!(error = %e, fallback, "SELECT DATABASE() failed, using fallback schema");
                fallback.to_string()
            }
        }
    }

    /// Columns and indexes of `schema.table`.
    pub async fn describe_table(
        conn: &ActiveConnection,
        table: &str,
        schema: &str,
    ) -> DbResult<TableDescription> {
        let db = conn.handle();
        let primary = conn.dialect().await;

        let columns = with_fallback("describe_table.columns", primary, |dialect| async move {
            let sql = match dialect {
                Dialect::Postgres => queries::postgres::COLUMNS,
                Dialect::MySql => queries::mysql::COLUMNS,
            };
            db.fetch(sql, &[table, schema]).await
        })
        .await?;

        let indexes = with_fallback("describe_table.indexes", primary, |dialect| async move {
            let sql = match dialect {
                Dialect::Postgres => queries::postgres::INDEXES,
                Dialect::MySql => queries::mysql::INDEXES,
            };
            db.fetch(sql, &[table, schema]).await
        })
        .await?;

        let description = TableDescription {
            columns: columns.iter().map(column_info).collect(),
            indexes: indexes.iter().map(index_info).collect(),
        };
        debug!(
            table,
            schema,
            columns = description.columns.len(),
            indexes = description.indexes.len(),
            "Described table"
        );
        Ok(description)
    }

    /// Row count, sizes, last analyze time and column nullability of `schema.table`.
    ///
    /// Only the row count is required; every other figure degrades to "N/A".
    pub async fn analyze_table(
        conn: &ActiveConnection,
        table: &str,
        schema: &str,
    ) -> DbResult<TableStats> {
        let db = conn.handle();
        let primary = conn.dialect().await;

        let (dialect, row_count) = with_fallback("analyze_table", primary, |dialect| async move {
            let sql = match dialect {
                Dialect::Postgres => format!("SELECT COUNT(*) FROM {}", quote_postgres(schema, table)),
                Dialect::MySql => format!("SELECT COUNT(*) FROM {}", quote_mysql(schema, table)),
            };
            let set = db.fetch(&sql, &[]).await?;
            Ok((dialect, set.scalar().as_i64().unwrap_or(0)))
        })
        .await?;

        let mut stats = TableStats::new(table, row_count);
        match dialect {
            Dialect::Postgres => postgres::fill_stats(db, schema, table, &mut stats).await,
            Dialect::MySql => mysql::fill_stats(db, schema, table, &mut stats).await,
        }
        debug!(table, schema, row_count, dialect = %dialect, "Analyzed table");
        Ok(stats)
    }

    /// Database name, server version, user schemas and table count.
    pub async fn db_info(conn: &ActiveConnection) -> DbResult<DbInfo> {
        let db = conn.handle();
        let primary = conn.dialect().await;

        with_fallback("get_db_info", primary, |dialect| async move {
            match dialect {
                Dialect::Postgres => postgres::db_info(db).await,
                Dialect::MySql => mysql::db_info(db).await,
            }
        })
        .await
    }
}

/// `"schema"."table"` with embedded double quotes doubled.
pub fn quote_postgres(schema: &str, table: &str) -> String {
    format!(
        "\"{}\".\"{}\"",
        schema.replace('"', "\"\""),
        table.replace('"', "\"\"")
    )
}

/// `` `schema`.`table` `` with embedded backticks doubled.
pub fn quote_mysql(schema: &str, table: &str) -> String {
    format!(
        "`{}`.`{}`",
        schema.replace('`', "``"),
        table.replace('`', "``")
    )
}

fn column_info(row: RowView<'_>) -> ColumnInfo {
    ColumnInfo {
        name: row.text("column_name").unwrap_or_default(),
        data_type: row.text("data_type").unwrap_or_default(),
        is_nullable: row.flag("is_nullable"),
        is_primary_key: row.flag("is_primary_key"),
        default_value: row.text("default_value").filter(|d| !d.is_empty()),
        char_max_length: row.get("character_maximum_length").as_i64(),
    }
}

fn index_info(row: RowView<'_>) -> IndexInfo {
    IndexInfo {
        name: row.text("index_name").unwrap_or_default(),
        columns: index_columns(row.get("columns")),
        is_unique: row.flag("is_unique"),
    }
}

/// Index columns arrive as a decoded array, a `{a,b}` literal or a `a,b` list.
fn index_columns(value: &SqlValue) -> Vec<String> {
    match value {
        SqlValue::Json(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(String::from)
            .collect(),
        other => other
            .as_text()
            .map(|raw| parse_index_columns(&raw))
            .unwrap_or_default(),
    }
}

/// Nullability map from a `(column_name, nullability)` result.
fn column_stats(set: &RowSet, stats: &mut TableStats) {
    for row in set.iter().take(COLUMN_STATS_LIMIT) {
        if let (Some(name), Some(nullability)) = (row.at(0).as_text(), row.at(1).as_text()) {
            stats.column_stats.insert(name, nullability);
        }
    }
}

/// Render `SELECT version()` output the way tools report it.
pub fn postgres_version_label(raw: &str) -> String {
    if raw.contains("PostgreSQL") {
        if let Some(number) = raw.split_whitespace().nth(1) {
            return format!("PostgreSQL {}", number);
        }
    }
    raw.to_string()
}

fn strings(set: &RowSet) -> Vec<String> {
    set.iter().filter_map(|row| row.at(0).as_text()).collect()
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    /// Names the current database on MySQL; fails on Postgres.
    pub const CURRENT_DATABASE: &str = "SELECT DATABASE()";

    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT
                table_name AS name,
                table_schema AS schema_name,
                table_type AS table_type
            FROM information_schema.tables
            WHERE table_schema NOT IN ('information_schema', 'pg_catalog')
            ORDER BY table_name
            "#;

        pub const LIST_TABLES_IN_SCHEMA: &str = r#"
            SELECT
                table_name AS name,
                table_schema AS schema_name,
                table_type AS table_type
            FROM information_schema.tables
            WHERE table_schema = $1
            ORDER BY table_name
            "#;

        pub const COLUMNS: &str = r#"
            SELECT
                c.column_name,
                c.data_type,
                CASE WHEN c.is_nullable = 'YES' THEN true ELSE false END AS is_nullable,
                COALESCE(c.column_default, '') AS default_value,
                c.character_maximum_length,
                CASE WHEN pk.column_name IS NOT NULL THEN true ELSE false END AS is_primary_key
            FROM information_schema.columns c
            LEFT JOIN (
                SELECT ku.column_name
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage ku
                    ON tc.constraint_name = ku.constraint_name
                WHERE tc.constraint_type = 'PRIMARY KEY'
                    AND tc.table_name = $1
                    AND tc.table_schema = $2
            ) pk ON c.column_name = pk.column_name
            WHERE c.table_name = $1 AND c.table_schema = $2
            ORDER BY c.ordinal_position
            "#;

        pub const INDEXES: &str = r#"
            SELECT
                i.relname AS index_name,
                array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS columns,
                ix.indisunique AS is_unique
            FROM pg_class t
            JOIN pg_index ix ON t.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            JOIN pg_namespace n ON n.oid = t.relnamespace
            WHERE t.relname = $1 AND n.nspname = $2
            GROUP BY i.relname, ix.indisunique
            ORDER BY i.relname
            "#;

        pub const TABLE_SIZE: &str = r#"
            SELECT
                pg_size_pretty(pg_total_relation_size(quote_ident(schemaname) || '.' || quote_ident(tablename))) AS total_size,
                pg_size_pretty(pg_relation_size(quote_ident(schemaname) || '.' || quote_ident(tablename))) AS table_size,
                pg_size_pretty(
                    pg_total_relation_size(quote_ident(schemaname) || '.' || quote_ident(tablename))
                    - pg_relation_size(quote_ident(schemaname) || '.' || quote_ident(tablename))
                ) AS index_size
            FROM pg_tables
            WHERE schemaname = $1 AND tablename = $2
            "#;

        pub const LAST_ANALYZE: &str = r#"
            SELECT last_analyze, last_autoanalyze
            FROM pg_stat_user_tables
            WHERE schemaname = $1 AND relname = $2
            "#;

        pub const COLUMN_NULLABILITY: &str = r#"
            SELECT
                a.attname::text AS column_name,
                CASE WHEN a.attnotnull THEN 'Not Null' ELSE 'Nullable' END AS nullability
            FROM pg_attribute a
            JOIN pg_class t ON a.attrelid = t.oid
            JOIN pg_namespace n ON t.relnamespace = n.oid
            WHERE n.nspname = $1 AND t.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped
            ORDER BY a.attnum
            LIMIT 5
            "#;

        pub const CURRENT_DATABASE: &str = "SELECT current_database()";
        pub const VERSION: &str = "SELECT version()";

        pub const SCHEMAS: &str = r#"
            SELECT schema_name
            FROM information_schema.schemata
            WHERE schema_name NOT IN ('information_schema', 'pg_catalog', 'pg_toast')
            "#;

        pub const TABLE_COUNT: &str = r#"
            SELECT COUNT(*)
            FROM information_schema.tables
            WHERE table_schema NOT IN ('information_schema', 'pg_catalog', 'pg_toast')
            "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT
                table_name AS name,
                table_schema AS schema_name,
                table_type AS table_type
            FROM information_schema.tables
            WHERE table_schema NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
            ORDER BY table_name
            "#;

        pub const LIST_TABLES_IN_SCHEMA: &str = r#"
            SELECT
                table_name AS name,
                table_schema AS schema_name,
                table_type AS table_type
            FROM information_schema.tables
            WHERE table_schema = ?
            ORDER BY table_name
            "#;

        pub const COLUMNS: &str = r#"
            SELECT
                COLUMN_NAME AS column_name,
                DATA_TYPE AS data_type,
                CASE WHEN IS_NULLABLE = 'YES' THEN true ELSE false END AS is_nullable,
                COALESCE(COLUMN_DEFAULT, '') AS default_value,
                CHARACTER_MAXIMUM_LENGTH AS character_maximum_length,
                CASE WHEN COLUMN_KEY = 'PRI' THEN true ELSE false END AS is_primary_key
            FROM information_schema.columns
            WHERE table_name = ? AND table_schema = ?
            ORDER BY ordinal_position
            "#;

        pub const INDEXES: &str = r#"
            SELECT
                INDEX_NAME AS index_name,
                GROUP_CONCAT(COLUMN_NAME ORDER BY SEQ_IN_INDEX) AS columns,
                CASE WHEN NON_UNIQUE = 0 THEN true ELSE false END AS is_unique
            FROM information_schema.statistics
            WHERE table_name = ? AND table_schema = ?
            GROUP BY index_name, non_unique
            ORDER BY index_name
            "#;

        pub const TABLE_SIZE: &str = r#"
            SELECT
                ROUND(((data_length + index_length) / 1024 / 1024), 2) AS total_size_mb,
                ROUND((data_length / 1024 / 1024), 2) AS table_size_mb,
                ROUND((index_length / 1024 / 1024), 2) AS index_size_mb
            FROM information_schema.tables
            WHERE table_schema = ? AND table_name = ?
            "#;

        pub const COLUMN_NULLABILITY: &str = r#"
            SELECT
                COLUMN_NAME AS column_name,
                CASE WHEN IS_NULLABLE = 'YES' THEN 'Nullable' ELSE 'Not Null' END AS nullability
            FROM information_schema.columns
            WHERE table_schema = ? AND table_name = ?
            ORDER BY ordinal_position
            LIMIT 5
            "#;

        pub const CURRENT_DATABASE: &str = "SELECT DATABASE()";
        pub const VERSION: &str = "SELECT VERSION()";

        pub const SCHEMAS: &str = r#"
            SELECT SCHEMA_NAME
            FROM information_schema.SCHEMATA
            WHERE SCHEMA_NAME NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
            "#;

        pub const TABLE_COUNT: &str = r#"
            SELECT COUNT(*)
            FROM information_schema.tables
            WHERE table_schema NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
            "#;
    }
}

// =============================================================================
// PostgreSQL Implementation
// =============================================================================

mod postgres {
    use super::*;

    pub async fn fill_stats(
        db: &dyn DbConnection,
        schema: &str,
        table: &str,
        stats: &mut TableStats,
    ) {
        if let Ok(set) = db.fetch(queries::postgres::TABLE_SIZE, &[schema, table]).await {
            if let Some(row) = set.first() {
                let size = |name: &str| row.text(name).unwrap_or_else(|| NOT_AVAILABLE.to_string());
                stats.total_size = size("total_size");
                stats.table_size = size("table_size");
                stats.index_size = size("index_size");
            }
        }

        stats.last_analyzed = match db.fetch(queries::postgres::LAST_ANALYZE, &[schema, table]).await {
            Ok(set) => last_analyzed_label(set.first()),
            Err(e) => {
                debug!(error = %e, "pg_stat_user_tables lookup failed");
                NOT_AVAILABLE.to_string()
            }
        };

        if let Ok(set) = db
            .fetch(queries::postgres::COLUMN_NULLABILITY, &[schema, table])
            .await
        {
            column_stats(&set, stats);
        }
    }

    pub fn last_analyzed_label(row: Option<RowView<'_>>) -> String {
        let Some(row) = row else {
            return NOT_AVAILABLE.to_string();
        };
        if let Some(ts) = row.text("last_analyze") {
            ts
        } else if let Some(ts) = row.text("last_autoanalyze") {
            format!("{} (auto)", ts)
        } else {
            "Never".to_string()
        }
    }

    pub async fn db_info(db: &dyn DbConnection) -> DbResult<DbInfo> {
        let database_name = db
            .fetch(queries::postgres::CURRENT_DATABASE, &[])
            .await?
            .scalar()
            .as_text()
            .unwrap_or_default();
        let raw_version = db
            .fetch(queries::postgres::VERSION, &[])
            .await?
            .scalar()
            .as_text()
            .unwrap_or_default();
        let schemas = strings(&db.fetch(queries::postgres::SCHEMAS, &[]).await?);
        let table_count = db
            .fetch(queries::postgres::TABLE_COUNT, &[])
            .await?
            .scalar()
            .as_i64()
            .unwrap_or(0);

        Ok(DbInfo {
            database_name,
            version: postgres_version_label(&raw_version),
            schemas,
            table_count,
        })
    }
}

// =============================================================================
// MySQL Implementation
// =============================================================================

mod mysql {
    use super::*;

    /// Reported when the server keeps no analyze timestamp.
    pub const LAST_ANALYZED_UNAVAILABLE: &str = "N/A (MySQL)";

    pub async fn fill_stats(
        db: &dyn DbConnection,
        schema: &str,
        table: &str,
        stats: &mut TableStats,
    ) {
        match db.fetch(queries::mysql::TABLE_SIZE, &[schema, table]).await {
            Ok(set) => {
                if let Some(row) = set.first() {
                    stats.total_size = megabytes(row.get("total_size_mb"));
                    stats.table_size = megabytes(row.get("table_size_mb"));
                    stats.index_size = megabytes(row.get("index_size_mb"));
                }
            }
            Err(e) => debug!(error = %e, "Table size lookup failed"),
        }

        stats.last_analyzed = LAST_ANALYZED_UNAVAILABLE.to_string();

        if let Ok(set) = db
            .fetch(queries::mysql::COLUMN_NULLABILITY, &[schema, table])
            .await
        {
            column_stats(&set, stats);
        }
    }

    pub fn megabytes(value: &SqlValue) -> String {
        value
            .as_f64()
            .map(|mb| format!("{:.2} MB", mb))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub async fn db_info(db: &dyn DbConnection) -> DbResult<DbInfo> {
        let database_name = db
            .fetch(queries::mysql::CURRENT_DATABASE, &[])
            .await?
            .scalar()
            .as_text()
            .unwrap_or_default();
        let version = db
            .fetch(queries::mysql::VERSION, &[])
            .await?
            .scalar()
            .as_text()
            .unwrap_or_default();
        let schemas = strings(&db.fetch(queries::mysql::SCHEMAS, &[]).await?);
        let table_count = db
            .fetch(queries::mysql::TABLE_COUNT, &[])
            .await?
            .scalar()
            .as_i64()
            .unwrap_or(0);

        Ok(DbInfo {
            database_name,
            version: format!("MySQL {}", version),
            schemas,
            table_count,
        })
    }
}
