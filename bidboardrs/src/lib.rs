pub mod backends;
pub mod config;
pub mod diagnostics;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod format;
pub mod params;
pub mod query_builder;
pub mod reports;
pub mod runtime;
pub mod sql_ast;
pub mod upload;

pub use backends::{ConnectionFactory, WarehouseConnection, WarehouseFactory};
pub use config::{BidboardConfig, WarehouseKind};
pub use diagnostics::Diagnostics;
pub use error::BidboardError;
pub use executor::{
    ColumnMeta, FailureKind, QueryExecutor, QueryFailure, QueryOutcome, TabularResult,
};
pub use format::{format_magnitude, KpiSummary};
pub use params::{ConfigProvider, EnvSource, ParamName, SecretsStore};
pub use query_builder::{Dimension, KpiMetric, ReportFilter, ReportQueryBuilder};
pub use reports::ReportService;
pub use runtime::Bidboard;
pub use sql_ast::{BoundQuery, TablePath};
pub use upload::{parse_keyword_csv, BidConstraint, Volatility};
