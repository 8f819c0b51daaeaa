//! Lexical SQL classifier.
//!
//! Intent comes from the leading keyword of the trimmed, lower-cased text, and
//! the destructive-operation denylist is a plain substring match. Neither check
//! understands comments, string literals or multi-statement batches.
//!
//! # Examples
//!
//! ```
//! use db_gateway_mcp::models::QueryIntent;
//! use db_gateway_mcp::tools::guard::classify;
//!
//! assert_eq!(classify("SELECT * FROM users", true).unwrap(), QueryIntent::Read);
//! assert_eq!(classify("INSERT INTO t VALUES (1)", false).unwrap(), QueryIntent::Write);
//! assert!(classify("INSERT INTO t VALUES (1)", true).is_err());
//! assert!(classify("truncate table logs", false).is_err());
//! ```

use crate::error::{DbError, DbResult};
use crate::models::QueryIntent;

/// Substrings that are rejected anywhere in a statement, in any mode.
pub const FORBIDDEN_PATTERNS: &[&str] = &["drop database", "drop schema", "truncate"];

/// Message carried by read-only rejections.
pub const READ_ONLY_MESSAGE: &str = "write operations are not allowed";

fn normalized(sql: &str) -> String {
    sql.trim().to_lowercase()
}

/// True when the statement starts with `select`.
pub fn is_select(sql: &str) -> bool {
    normalized(sql).starts_with("select")
}

/// True when the statement starts with `show`.
pub fn is_show(sql: &str) -> bool {
    normalized(sql).starts_with("show")
}

/// Intent from the leading keyword alone, before any policy is applied.
pub fn intent_of(sql: &str) -> QueryIntent {
    let lower = normalized(sql);
    if forbidden_in(&lower).is_some() {
        QueryIntent::Forbidden
    } else if lower.starts_with("select") || lower.starts_with("show") {
        QueryIntent::Read
    } else {
        QueryIntent::Write
    }
}

fn forbidden_in(lower: &str) -> Option<&'static str> {
    FORBIDDEN_PATTERNS
        .iter()
        .copied()
        .find(|pattern| lower.contains(pattern))
}

/// Gate `sql` by read-only mode, then by the denylist.
///
/// Returns `Read` or `Write` for accepted statements.
pub fn classify(sql: &str, read_only: bool) -> DbResult<QueryIntent> {
    let lower = normalized(sql);
    let intent = if lower.starts_with("select") || lower.starts_with("show") {
        QueryIntent::Read
    } else {
        QueryIntent::Write
    };

    if read_only && intent == QueryIntent::Write {
        return Err(DbError::read_only_violation(READ_ONLY_MESSAGE));
    }
    if let Some(pattern) = forbidden_in(&lower) {
        return Err(DbError::forbidden_operation(pattern));
    }
    Ok(intent)
}

/// Statement label used in `execute_query` messages.
pub fn operation_label(sql: &str) -> &'static str {
    let lower = normalized(sql);
    [
        ("insert", "INSERT"),
        ("update", "UPDATE"),
        ("delete", "DELETE"),
        ("create", "CREATE"),
        ("alter", "ALTER"),
        ("drop", "DROP"),
    ]
    .into_iter()
    .find(|(prefix, _)| lower.starts_with(prefix))
    .map(|(_, label)| label)
    .unwrap_or("QUERY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_statements() {
        assert_eq!(classify("select 1", true).unwrap(), QueryIntent::Read);
        assert_eq!(classify("  SHOW TABLES", true).unwrap(), QueryIntent::Read);
        assert_eq!(classify("\n\tSeLeCt now()", false).unwrap(), QueryIntent::Read);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        for sql in [
            "INSERT INTO t VALUES (1)",
            "update t set a = 1",
            "with x as (select 1) select * from x",
            "explain select 1",
            "",
        ] {
            let err = classify(sql, true).unwrap_err();
            assert!(
                matches!(err, DbError::ReadOnlyViolation { .. }),
                "expected read-only rejection for {sql:?}"
            );
        }
    }

    #[test]
    fn test_read_only_check_runs_before_denylist() {
        let err = classify("DROP DATABASE prod", true).unwrap_err();
        assert_eq!(err.to_string(), "read-only mode: write operations are not allowed");
    }

    #[test]
    fn test_denylist_applies_without_read_only() {
        let err = classify("DROP DATABASE prod", false).unwrap_err();
        assert_eq!(err.to_string(), "dangerous operation detected: drop database");

        let err = classify("drop schema audit cascade", false).unwrap_err();
        assert_eq!(err.to_string(), "dangerous operation detected: drop schema");
    }

    #[test]
    fn test_denylist_is_a_substring_match() {
        // Lexical matching also catches reads and literals
        let err = classify("SELECT 'please truncate me'", true).unwrap_err();
        assert!(matches!(err, DbError::ForbiddenOperation { .. }));

        let err = classify("delete from t; TRUNCATE t", false).unwrap_err();
        assert!(matches!(err, DbError::ForbiddenOperation { .. }));
    }

    #[test]
    fn test_drop_table_is_not_forbidden() {
        assert_eq!(classify("DROP TABLE tmp", false).unwrap(), QueryIntent::Write);
    }

    #[test]
    fn test_intent_of() {
        assert_eq!(intent_of("select 1"), QueryIntent::Read);
        assert_eq!(intent_of("insert into t values (1)"), QueryIntent::Write);
        assert_eq!(intent_of("TRUNCATE t"), QueryIntent::Forbidden);
    }

    #[test]
    fn test_operation_label() {
        assert_eq!(operation_label("INSERT INTO t VALUES (1)"), "INSERT");
        assert_eq!(operation_label("  update t set a = 1"), "UPDATE");
        assert_eq!(operation_label("delete from t"), "DELETE");
        assert_eq!(operation_label("create table t (id int)"), "CREATE");
        assert_eq!(operation_label("ALTER TABLE t ADD c int"), "ALTER");
        assert_eq!(operation_label("drop table t"), "DROP");
        assert_eq!(operation_label("grant all on t to u"), "QUERY");
    }

    #[test]
    fn test_is_select_and_is_show() {
        assert!(is_select("  Select 1"));
        assert!(!is_select("show tables"));
        assert!(is_show("SHOW databases"));
        assert!(!is_show("select 1"));
    }
}
