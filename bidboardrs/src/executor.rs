use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::backends::ConnectionFactory;
use crate::config::WarehouseKind;
use crate::dialect::Dialect;
use crate::error::{BidboardError, Result};
use crate::sql_ast::BoundQuery;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    /// Warehouse type name when the backend reports one.
    pub type_name: Option<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
        }
    }

    pub fn typed(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
        }
    }
}

/// Normalized result set: named columns and rows aligned to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// Build a result, rejecting rows whose width differs from the column list.
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(BidboardError::Execution(format!(
                "row {idx} has {} values but {} columns were declared",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Zero rows and no known columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Zero rows with a known column list.
    pub fn with_columns(columns: Vec<ColumnMeta>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column; names compare case-insensitively since warehouses
    /// differ in how they fold unquoted aliases.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows as JSON objects keyed by column name.
    pub fn into_records(self) -> Vec<Map<String, Value>> {
        let names: Vec<String> = self.columns.into_iter().map(|c| c.name).collect();
        self.rows
            .into_iter()
            .map(|row| names.iter().cloned().zip(row).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Required connection parameters are absent.
    NoConnection,
    Configuration,
    Connection,
    Auth,
    Timeout,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl QueryFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(err: &BidboardError) -> Self {
        let kind = match err {
            BidboardError::MissingCredentials { .. } => FailureKind::NoConnection,
            BidboardError::Config(_) => FailureKind::Configuration,
            BidboardError::Connection(_) | BidboardError::Io(_) => FailureKind::Connection,
            BidboardError::Auth(_) => FailureKind::Auth,
            BidboardError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Execution,
        };
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Outcome of one query. Failures are values so zero matching rows and a
/// failed statement stay distinguishable.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(TabularResult),
    Failed(QueryFailure),
}

impl QueryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }

    pub fn table(&self) -> Option<&TabularResult> {
        match self {
            QueryOutcome::Rows(t) => Some(t),
            QueryOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&QueryFailure> {
        match self {
            QueryOutcome::Rows(_) => None,
            QueryOutcome::Failed(f) => Some(f),
        }
    }

    /// Degrade a failure to an empty result.
    pub fn into_table(self) -> TabularResult {
        match self {
            QueryOutcome::Rows(t) => t,
            QueryOutcome::Failed(_) => TabularResult::empty(),
        }
    }

    pub fn into_result(self) -> std::result::Result<TabularResult, QueryFailure> {
        match self {
            QueryOutcome::Rows(t) => Ok(t),
            QueryOutcome::Failed(f) => Err(f),
        }
    }
}

/// Runs statements on a fresh connection per call.
#[derive(Clone)]
pub struct QueryExecutor {
    factory: Arc<dyn ConnectionFactory>,
}

impl QueryExecutor {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self { factory }
    }

    pub fn kind(&self) -> WarehouseKind {
        self.factory.kind()
    }

    pub fn dialect(&self) -> &(dyn Dialect + Send + Sync) {
        self.factory.dialect()
    }

    /// Execute a bound statement. Never returns an error: failures come back
    /// as [`QueryOutcome::Failed`] after being logged.
    pub async fn execute(&self, query: &BoundQuery) -> QueryOutcome {
        let start = Instant::now();
        tracing::trace!(sql = %query.sql, params = query.params.len(), "executing statement");

        let conn = match self.factory.connect().await {
            Ok(Some(conn)) => conn,
            Ok(None) => {
                tracing::error!(backend = %self.kind(), "no database connection available");
                return QueryOutcome::Failed(QueryFailure::new(
                    FailureKind::NoConnection,
                    "no database connection available",
                ));
            }
            Err(e) => {
                tracing::error!(backend = %self.kind(), error = %e, "failed to connect");
                return QueryOutcome::Failed(QueryFailure::from_error(&e));
            }
        };

        let result = conn.execute(query).await;
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "error closing connection");
        }
        drop(conn);

        match result {
            Ok(table) => {
                tracing::debug!(
                    rows = table.row_count(),
                    columns = table.columns().len(),
                    ms = start.elapsed().as_millis(),
                    "query executed"
                );
                QueryOutcome::Rows(table)
            }
            Err(e) => {
                tracing::error!(error = %e, ms = start.elapsed().as_millis(), "query execution failed");
                QueryOutcome::Failed(QueryFailure::from_error(&e))
            }
        }
    }

    /// Ad hoc passthrough for operator-entered SQL.
    pub async fn execute_sql(&self, sql: &str) -> QueryOutcome {
        self.execute(&BoundQuery::raw(sql)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TabularResult {
        TabularResult::new(
            vec![ColumnMeta::new("keyword"), ColumnMeta::new("clicks")],
            vec![
                vec![json!("crisps"), json!(10)],
                vec![json!("dip"), json!(3)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = TabularResult::new(
            vec![ColumnMeta::new("a"), ColumnMeta::new("b")],
            vec![vec![json!(1)]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 values but 2 columns"));
    }

    #[test]
    fn empty_result_keeps_columns() {
        let t = TabularResult::with_columns(vec![ColumnMeta::new("week")]);
        assert!(t.is_empty());
        assert_eq!(t.column_names(), vec!["week"]);
        assert!(TabularResult::empty().columns().is_empty());
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let t = sample();
        assert_eq!(t.cell(1, "KEYWORD"), Some(&json!("dip")));
        assert_eq!(
            t.column_values("clicks").unwrap(),
            vec![&json!(10), &json!(3)]
        );
        assert!(t.column_values("missing").is_none());
    }

    #[test]
    fn records_keep_column_names() {
        let records = sample().into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["keyword"], json!("crisps"));
        assert_eq!(records[1]["clicks"], json!(3));
    }

    #[test]
    fn failure_degrades_to_empty_table() {
        let outcome = QueryOutcome::Failed(QueryFailure::new(FailureKind::Auth, "denied"));
        assert!(outcome.is_failure());
        assert_eq!(outcome.failure().unwrap().kind, FailureKind::Auth);
        assert_eq!(outcome.into_table(), TabularResult::empty());
    }

    #[test]
    fn error_kinds_map_to_failure_kinds() {
        let f = QueryFailure::from_error(&BidboardError::Timeout { seconds: 30 });
        assert_eq!(f.kind, FailureKind::Timeout);
        let f = QueryFailure::from_error(&BidboardError::Execution("bad sql".into()));
        assert_eq!(f.kind, FailureKind::Execution);
        assert!(f.message.contains("bad sql"));
    }
}
