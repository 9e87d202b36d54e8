use serde_json::Value;

use crate::executor::{QueryExecutor, QueryFailure, QueryOutcome, TabularResult};
use crate::format::KpiSummary;
use crate::query_builder::{Dimension, KpiMetric, ReportFilter, ReportQueryBuilder};

/// Report entry points used by the dashboard pages.
#[derive(Clone)]
pub struct ReportService {
    executor: QueryExecutor,
    builder: ReportQueryBuilder,
}

impl ReportService {
    pub fn new(executor: QueryExecutor, builder: ReportQueryBuilder) -> Self {
        Self { executor, builder }
    }

    pub fn builder(&self) -> &ReportQueryBuilder {
        &self.builder
    }

    pub async fn performance_data(&self, filter: &ReportFilter) -> QueryOutcome {
        self.executor
            .execute(&self.builder.performance_rows(filter))
            .await
    }

    /// `Ok(None)` when nothing matched.
    pub async fn dashboard_metrics(
        &self,
        week: Option<&str>,
    ) -> Result<Option<KpiSummary>, QueryFailure> {
        let table = self
            .executor
            .execute(&self.builder.kpi_summary(week))
            .await
            .into_result()?;
        Ok(KpiSummary::from_row(&table))
    }

    pub async fn chart_data(&self, primary: KpiMetric, secondary: KpiMetric) -> QueryOutcome {
        self.executor
            .execute(&self.builder.time_series(primary, secondary))
            .await
    }

    /// Campaign dropdown, "All Campaign" first.
    pub async fn available_campaigns(&self) -> Vec<String> {
        self.dropdown(Dimension::Campaign).await
    }

    /// Keyword dropdown, "All Keywords" first.
    pub async fn available_keywords(&self) -> Vec<String> {
        self.dropdown(Dimension::Keyword).await
    }

    /// Weeks, most recent first.
    pub async fn available_weeks(&self) -> Vec<String> {
        self.dropdown(Dimension::Week).await
    }

    async fn dropdown(&self, dimension: Dimension) -> Vec<String> {
        let mut values: Vec<String> = dimension.sentinel().map(str::to_string).into_iter().collect();
        match self
            .executor
            .execute(&self.builder.distinct_values(dimension))
            .await
        {
            QueryOutcome::Rows(table) => values.extend(first_column(&table)),
            QueryOutcome::Failed(failure) => {
                tracing::warn!(dimension = ?dimension, %failure, "dropdown lookup failed");
            }
        }
        values
    }
}

fn first_column(table: &TabularResult) -> impl Iterator<Item = String> + '_ {
    table.rows().iter().filter_map(|row| match row.first()? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}
