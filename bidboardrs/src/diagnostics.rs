//! Operator diagnostics: connectivity check, table listing, previews and ad hoc SQL.

use crate::executor::{QueryExecutor, QueryFailure, QueryOutcome};
use crate::query_builder::ReportQueryBuilder;
use crate::sql_ast::BoundQuery;

#[derive(Clone)]
pub struct Diagnostics {
    executor: QueryExecutor,
    builder: ReportQueryBuilder,
}

impl Diagnostics {
    pub fn new(executor: QueryExecutor, builder: ReportQueryBuilder) -> Self {
        Self { executor, builder }
    }

    pub fn data_source_name(&self) -> &'static str {
        self.executor.kind().display_name()
    }

    /// Runs `SELECT 1`. Any failure, including missing credentials, is `false`.
    pub async fn test_connection(&self) -> bool {
        match self.executor.execute(&BoundQuery::raw("SELECT 1")).await {
            QueryOutcome::Rows(_) => true,
            QueryOutcome::Failed(failure) => {
                tracing::info!(backend = %self.executor.kind(), %failure, "connection test failed");
                false
            }
        }
    }

    pub async fn list_tables(&self) -> QueryOutcome {
        self.executor.execute(&self.builder.show_tables()).await
    }

    /// Preview a table in the configured catalog and schema. Names outside the
    /// identifier allow-list fail without reaching the warehouse.
    pub async fn sample_rows(&self, table: &str, limit: u64) -> QueryOutcome {
        match self.builder.table().with_table(table) {
            Ok(path) => {
                self.executor
                    .execute(&self.builder.sample_rows(&path, limit))
                    .await
            }
            Err(e) => QueryOutcome::Failed(QueryFailure::from_error(&e)),
        }
    }

    pub async fn column_names(&self, table: &str) -> Vec<String> {
        match self.sample_rows(table, 1).await {
            QueryOutcome::Rows(t) => t.column_names().into_iter().map(str::to_string).collect(),
            QueryOutcome::Failed(_) => Vec::new(),
        }
    }

    pub async fn run_custom(&self, sql: &str) -> QueryOutcome {
        self.executor.execute_sql(sql).await
    }
}
