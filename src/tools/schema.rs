//! Schema introspection tools.
//!
//! This module implements the `list_tables`, `describe_table`, `analyze_table`
//! and `get_db_info` MCP tools.

use crate::db::ActiveConnection;
use crate::db::executor::{
    ANALYZE_TIMEOUT, DB_INFO_TIMEOUT, DESCRIBE_TIMEOUT, LIST_TABLES_TIMEOUT, with_deadline,
};
use crate::db::schema::SchemaInspector;
use crate::error::{DbError, DbResult};
use crate::models::{DbInfo, TableDescription, TableInfo, TableStats};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Schema to list. Omit to list every non-system schema.
    #[serde(default)]
    pub schema: Option<String>,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    /// Tables and views ordered by schema and name
    pub tables: Vec<TableInfo>,
}

/// Input for the describe_table and analyze_table tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableInput {
    /// Table name
    pub table_name: String,
    /// Schema containing the table. Defaults to the current database (MySQL) or the session schema.
    #[serde(default)]
    pub schema: Option<String>,
}

/// Output from the analyze_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AnalyzeTableOutput {
    pub stats: TableStats,
}

/// Input for tools that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct EmptyInput {}

pub struct SchemaToolHandler;

impl SchemaToolHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_tables(
        &self,
        conn: &ActiveConnection,
        input: ListTablesInput,
    ) -> DbResult<ListTablesOutput> {
        let schema = input.schema.as_deref();
        let tables = with_deadline(
            "list_tables",
            LIST_TABLES_TIMEOUT,
            SchemaInspector::list_tables(conn, schema),
        )
        .await?;

        info!(
            connection = %conn.name(),
            schema = schema.unwrap_or("*"),
            count = tables.len(),
            "Listed tables"
        );
        Ok(ListTablesOutput { tables })
    }

    /// Describe a table. `current_schema` is used when the server does not name a database.
    pub async fn describe_table(
        &self,
        conn: &ActiveConnection,
        current_schema: &str,
        input: TableInput,
    ) -> DbResult<TableDescription> {
        let table = required_table(&input)?;
        let description = with_deadline("describe_table", DESCRIBE_TIMEOUT, async {
            let schema =
                SchemaInspector::resolve_schema(conn, input.schema.as_deref(), current_schema).await;
            SchemaInspector::describe_table(conn, table, &schema).await
        })
        .await?;

        info!(
            connection = %conn.name(),
            table,
            columns = description.columns.len(),
            indexes = description.indexes.len(),
            "Described table"
        );
        Ok(description)
    }

    pub async fn analyze_table(
        &self,
        conn: &ActiveConnection,
        current_schema: &str,
        input: TableInput,
    ) -> DbResult<AnalyzeTableOutput> {
        let table = required_table(&input)?;
        let stats = with_deadline("analyze_table", ANALYZE_TIMEOUT, async {
            let schema =
                SchemaInspector::resolve_schema(conn, input.schema.as_deref(), current_schema).await;
            SchemaInspector::analyze_table(conn, table, &schema).await
        })
        .await?;

        info!(
            connection = %conn.name(),
            table,
            row_count = stats.row_count,
            "Analyzed table"
        );
        Ok(AnalyzeTableOutput { stats })
    }

    pub async fn get_db_info(&self, conn: &ActiveConnection) -> DbResult<DbInfo> {
        let db_info =
            with_deadline("get_db_info", DB_INFO_TIMEOUT, SchemaInspector::db_info(conn)).await?;
        info!(
            connection = %conn.name(),
            database = %db_info.database_name,
            table_count = db_info.table_count,
            "Fetched database info"
        );
        Ok(db_info)
    }
}

impl Default for SchemaToolHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn required_table(input: &TableInput) -> DbResult<&str> {
    let table = input.table_name.trim();
    if table.is_empty() {
        return Err(DbError::invalid_input("table_name must not be empty"));
    }
    Ok(table)
}
