//! Schema introspection
//!
//! `describe_table` and `sample_rows` never fail: a missing table or a
//! broken catalog lookup comes back as an empty view so the agent can try
//! another name. Only `list_tables` reports failure, because without it the
//! agent has nothing to recover with.

use crate::db::{quote_identifier, DbContext, Execution};
use crate::error::DbError;
use crate::model::{SampleDataView, TableDescriptor, SAMPLE_ROW_LIMIT};

/// List the user tables of the connected database
pub async fn list_tables(ctx: &DbContext) -> Result<Vec<String>, DbError> {
    let tables = ctx.backend().table_names().await?;
    tracing::debug!("Found {} tables", tables.len());
    Ok(tables)
}

/// Describe the columns of `table`
pub async fn describe_table(ctx: &DbContext, table: &str) -> TableDescriptor {
    match ctx.backend().columns(table).await {
        Ok(columns) => {
            if columns.is_empty() {
                tracing::debug!("Table '{}' not found in catalog", table);
            }
            TableDescriptor {
                table: table.to_string(),
                columns,
                error: None,
            }
        }
        Err(e) => {
            tracing::error!("Error describing table {}: {}", table, e);
            TableDescriptor::empty(table, Some(e.to_string()))
        }
    }
}

/// Fetch up to [`SAMPLE_ROW_LIMIT`] rows of `table` together with its column names
pub async fn sample_rows(ctx: &DbContext, table: &str) -> SampleDataView {
    let columns = match ctx.backend().columns(table).await {
        Ok(columns) => columns,
        Err(e) => {
            tracing::error!("Error fetching sample data for table {}: {}", table, e);
            return SampleDataView::failed(table, e.to_string());
        }
    };

    let sql = format!(
        "SELECT * FROM {} LIMIT {}",
        quote_identifier(table),
        SAMPLE_ROW_LIMIT
    );

    let rows = match ctx.backend().execute(&sql).await {
        Ok(Execution::Rows(rows)) => rows,
        Ok(Execution::Affected(_)) => Vec::new(),
        Err(e) => {
            tracing::error!("Error fetching sample data for table {}: {}", table, e);
            return SampleDataView::failed(table, e.to_string());
        }
    };

    SampleDataView {
        table: table.to_string(),
        columns: columns.into_iter().map(|c| c.name).collect(),
        sample_rows: rows,
        error: None,
    }
}
