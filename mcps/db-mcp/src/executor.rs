//! Raw SQL execution
//!
//! The statement text is run exactly as received. There is no allowlist and
//! no rewriting; whatever the configured credentials permit will run.

use crate::db::{DbContext, Execution};
use crate::model::QueryResult;

/// Execute `sql` and shape the outcome into a [`QueryResult`]
///
/// Errors of any kind (syntax, constraints, a connection lost mid-call)
/// become a failed envelope carrying the engine's message.
pub async fn run_sql(ctx: &DbContext, sql: &str) -> QueryResult {
    match ctx.backend().execute(sql).await {
        Ok(Execution::Rows(rows)) => {
            tracing::debug!("Query returned {} rows", rows.len());
            QueryResult::rows(sql, rows)
        }
        Ok(Execution::Affected(count)) => {
            tracing::debug!("Statement affected {} rows", count);
            QueryResult::affected(sql, count)
        }
        Err(e) => {
            tracing::error!("SQL error: {}", e);
            QueryResult::failed(sql, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::books_db;
    use serde_json::json;

    #[tokio::test]
    async fn test_select_returns_all_rows() {
        let (_dir, ctx) = books_db().await;
        let result = run_sql(&ctx, "SELECT id, title FROM books ORDER BY id").await;

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.row_count, 3);
        let rows = result.rows.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(serde_json::Value::Object(rows[0].clone()), json!({"id": 1, "title": "Dune"}));
    }

    #[tokio::test]
    async fn test_empty_select_still_has_rows() {
        let (_dir, ctx) = books_db().await;
        let result = run_sql(&ctx, "SELECT * FROM books WHERE id > 100").await;

        assert!(result.success);
        assert_eq!(result.row_count, 0);
        assert_eq!(result.rows, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_update_reports_affected_rows_and_commits() {
        let (_dir, ctx) = books_db().await;
        let result = run_sql(&ctx, "UPDATE books SET price = price + 5 WHERE price < 10").await;

        assert!(result.success);
        assert!(result.rows.is_none());
        assert_eq!(result.row_count, 2);

        let check = run_sql(&ctx, "SELECT COUNT(*) AS n FROM books WHERE price < 10").await;
        assert_eq!(check.rows.unwrap()[0]["n"], json!(0));
    }

    #[tokio::test]
    async fn test_single_row_update() {
        let (_dir, ctx) = books_db().await;
        let result = run_sql(&ctx, "UPDATE books SET title = 'X' WHERE id = 1").await;

        assert!(result.success);
        assert_eq!(result.row_count, 1);
        assert!(result.rows.is_none());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_sql_is_failed_envelope() {
        let (_dir, ctx) = books_db().await;
        let sql = "SELEC title FORM books";
        let result = run_sql(&ctx, sql).await;

        assert!(!result.success);
        assert_eq!(result.sql, sql);
        assert_eq!(result.row_count, 0);
        assert!(result.rows.is_none());
        assert!(!result.error.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_constraint_violation_is_failed_envelope() {
        let (_dir, ctx) = books_db().await;
        let result = run_sql(&ctx, "INSERT INTO books (id, title) VALUES (1, 'Duplicate')").await;

        assert!(!result.success);
        assert!(result.error.unwrap().to_lowercase().contains("unique"));

        let count = run_sql(&ctx, "SELECT COUNT(*) AS n FROM books").await;
        assert_eq!(count.rows.unwrap()[0]["n"], json!(3));
    }
}
