//! Warehouse backend implementations.
//!
//! Each backend is implemented in its own file. A connection lives for a single
//! statement: the executor asks the factory for a fresh one, runs, and closes it.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{QueryConfig, WarehouseKind};
use crate::dialect::{DatabricksDialect, Dialect, SnowflakeDialect};
use crate::error::{BidboardError, Result};
use crate::executor::TabularResult;
use crate::params::{ConfigProvider, ParamName};
use crate::sql_ast::BoundQuery;

/// A live session with a warehouse.
#[async_trait]
pub trait WarehouseConnection: Send + Sync {
    async fn execute(&self, query: &BoundQuery) -> Result<TabularResult>;

    /// Release the session. Called by the executor on success and failure paths.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Produces connections for the active backend.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    fn kind(&self) -> WarehouseKind;

    fn dialect(&self) -> &(dyn Dialect + Send + Sync) {
        dialect_for(self.kind())
    }

    /// `Ok(None)` when required parameters are missing; `Err` when a session
    /// could not be established.
    async fn connect(&self) -> Result<Option<Box<dyn WarehouseConnection>>>;
}

pub fn dialect_for(kind: WarehouseKind) -> &'static (dyn Dialect + Send + Sync) {
    match kind {
        WarehouseKind::Databricks => &DatabricksDialect,
        WarehouseKind::Snowflake => &SnowflakeDialect,
    }
}

const DATABRICKS_REQUIRED: &[ParamName] = &[ParamName::Host, ParamName::HttpPath, ParamName::Token];
const SNOWFLAKE_REQUIRED: &[ParamName] = &[ParamName::Account, ParamName::Token];

/// Factory for the configured warehouse. Parameters are resolved on every
/// connect and dropped with the connection attempt.
#[derive(Debug, Clone)]
pub struct WarehouseFactory {
    kind: WarehouseKind,
    provider: ConfigProvider,
    query: QueryConfig,
}

impl WarehouseFactory {
    /// Fails with [`BidboardError::Config`] when the data source is not recognized.
    pub fn new(provider: ConfigProvider) -> Result<Self> {
        let kind = provider.config().warehouse_kind()?;
        let query = provider.config().query.clone();
        tracing::info!(backend = %kind, "configured warehouse backend");
        Ok(Self {
            kind,
            provider,
            query,
        })
    }
}

#[async_trait]
impl ConnectionFactory for WarehouseFactory {
    fn kind(&self) -> WarehouseKind {
        self.kind
    }

    async fn connect(&self) -> Result<Option<Box<dyn WarehouseConnection>>> {
        let params = self.provider.connection_params(self.kind);
        let required = match self.kind {
            WarehouseKind::Databricks => DATABRICKS_REQUIRED,
            WarehouseKind::Snowflake => SNOWFLAKE_REQUIRED,
        };
        if let Err(e) = params.require(required) {
            tracing::warn!(backend = %self.kind, "{e}");
            return Ok(None);
        }

        let conn: Box<dyn WarehouseConnection> = match self.kind {
            WarehouseKind::Databricks => {
                Box::new(DatabricksConnection::open(params, &self.query)?)
            }
            WarehouseKind::Snowflake => Box::new(SnowflakeConnection::open(params, &self.query)?),
        };
        Ok(Some(conn))
    }
}

/// Shared HTTP status mapping for the warehouse REST APIs.
pub(crate) fn map_http_error(status: u16, detail: Option<String>) -> BidboardError {
    let detail = detail.filter(|d| !d.is_empty());
    match status {
        401 => BidboardError::Auth(detail.unwrap_or_else(|| "invalid or expired token".to_string())),
        403 => BidboardError::Auth(
            detail.unwrap_or_else(|| "insufficient warehouse permissions".to_string()),
        ),
        404 => BidboardError::Config(detail.unwrap_or_else(|| "warehouse not found".to_string())),
        _ => BidboardError::Connection(match detail {
            Some(d) => format!("HTTP error {status}: {d}"),
            None => format!("HTTP error {status}"),
        }),
    }
}

/// Per-request HTTP timeout. Always longer than any server-side wait a backend
/// asks for, so statement timeouts surface as `Timeout` rather than transport errors.
pub(crate) fn request_timeout(query: &QueryConfig) -> Duration {
    Duration::from_millis(query.timeout_ms.saturating_add(10_000))
}

pub(crate) fn http_client(query: &QueryConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout(query))
        .build()
        .map_err(|e| BidboardError::Connection(format!("build http client: {e}")))
}

mod databricks;
pub use databricks::DatabricksConnection;

mod snowflake;
pub use snowflake::SnowflakeConnection;

#[cfg(test)]
pub(crate) mod test_support {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Everything logged at any level while `f` runs.
    pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
