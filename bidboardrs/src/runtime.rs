use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::backends::{ConnectionFactory, WarehouseFactory};
use crate::config::{BidboardConfig, WarehouseKind};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::params::{ConfigProvider, ParamName};
use crate::query_builder::ReportQueryBuilder;
use crate::reports::ReportService;
use crate::sql_ast::TablePath;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a second call (tests, embedding apps) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Report and diagnostics services wired to one backend.
#[derive(Clone)]
pub struct Bidboard {
    pub reports: ReportService,
    pub diagnostics: Diagnostics,
}

impl Bidboard {
    /// Wire the configured warehouse, resolving parameters from process
    /// environment, the secrets file and the static defaults.
    pub fn from_config(config: BidboardConfig) -> Result<Self> {
        let provider = ConfigProvider::from_environment(config);
        let table = report_table(&provider)?;
        let factory = WarehouseFactory::new(provider)?;
        Ok(Self::with_factory(Arc::new(factory), table))
    }

    /// Wire services over any connection factory.
    pub fn with_factory(factory: Arc<dyn ConnectionFactory>, table: TablePath) -> Self {
        let builder = ReportQueryBuilder::for_backend(factory.kind(), table);
        let executor = QueryExecutor::new(factory);
        Self {
            reports: ReportService::new(executor.clone(), builder.clone()),
            diagnostics: Diagnostics::new(executor, builder),
        }
    }
}

/// Report table qualified by the backend's resolved namespace parameters.
pub fn report_table(provider: &ConfigProvider) -> Result<TablePath> {
    let kind = provider.config().warehouse_kind()?;
    let outer = match kind {
        WarehouseKind::Databricks => ParamName::Catalog,
        WarehouseKind::Snowflake => ParamName::Database,
    };
    let outer = provider.resolve(kind, outer);
    let schema = provider.resolve(kind, ParamName::Schema);
    TablePath::new(
        outer.as_deref(),
        schema.as_deref(),
        &provider.config().report.table,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EnvSource, SecretsStore};

    #[test]
    fn report_table_uses_resolved_namespace() {
        let provider = ConfigProvider::new(
            EnvSource::from_pairs([("DATABRICKS_CATALOG", "main")]),
            SecretsStore::empty(),
            BidboardConfig::default(),
        );
        let table = report_table(&provider).unwrap();
        assert_eq!(table.segments(), vec!["main", "bid_sample", "keyword_performance"]);
    }

    #[test]
    fn unsafe_table_name_is_rejected() {
        let mut config = BidboardConfig::default();
        config.report.table = "perf; DROP TABLE x".to_string();
        let provider = ConfigProvider::new(EnvSource::default(), SecretsStore::empty(), config);
        assert!(report_table(&provider).is_err());
    }
}
