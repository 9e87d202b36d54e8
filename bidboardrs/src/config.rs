//! Configuration system for bidboard.
//!
//! Supports a TOML file holding the active warehouse, query settings, the report
//! table and the static default tier of connection parameters.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BidboardError, Result};

/// The warehouse backends the dashboard can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseKind {
    Databricks,
    Snowflake,
}

impl WarehouseKind {
    /// Lowercase identifier used in config files and as the secrets table name.
    pub fn id(&self) -> &'static str {
        match self {
            WarehouseKind::Databricks => "databricks",
            WarehouseKind::Snowflake => "snowflake",
        }
    }

    /// Human readable name shown in the sidebar.
    pub fn display_name(&self) -> &'static str {
        match self {
            WarehouseKind::Databricks => "Databricks",
            WarehouseKind::Snowflake => "Snowflake",
        }
    }
}

impl fmt::Display for WarehouseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for WarehouseKind {
    type Err = BidboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "databricks" => Ok(WarehouseKind::Databricks),
            "snowflake" => Ok(WarehouseKind::Snowflake),
            other => Err(BidboardError::Config(format!(
                "invalid data source '{other}', must be 'databricks' or 'snowflake'"
            ))),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BidboardConfig {
    /// Active warehouse identifier ("databricks" or "snowflake").
    pub data_source: String,
    pub query: QueryConfig,
    pub report: ReportConfig,
    /// Static defaults for Databricks connection parameters.
    pub databricks: DatabricksDefaults,
    /// Static defaults for Snowflake connection parameters.
    pub snowflake: SnowflakeDefaults,
}

/// Statement execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Statement timeout in milliseconds (default: 30000).
    pub timeout_ms: u64,
    /// Delay between status polls of a running statement (default: 2000).
    pub poll_interval_ms: u64,
    /// Rows fetched by the diagnostics sample view (default: 10).
    pub sample_row_limit: u64,
}

/// Report source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Table holding weekly keyword performance rows.
    pub table: String,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabricksDefaults {
    pub host: String,
    pub token: String,
    pub http_path: String,
    pub catalog: String,
    pub schema: String,
}

#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SnowflakeDefaults {
    pub account: String,
    pub token: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: String,
}

impl Default for BidboardConfig {
    fn default() -> Self {
        Self {
            data_source: WarehouseKind::Databricks.id().to_string(),
            query: QueryConfig::default(),
            report: ReportConfig::default(),
            databricks: DatabricksDefaults::default(),
            snowflake: SnowflakeDefaults::default(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            poll_interval_ms: 2_000,
            sample_row_limit: 10,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            table: "keyword_performance".to_string(),
        }
    }
}

impl Default for DatabricksDefaults {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            http_path: String::new(),
            catalog: "default".to_string(),
            schema: "bid_sample".to_string(),
        }
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "(not set)"
    } else {
        "[REDACTED]"
    }
}

impl fmt::Debug for DatabricksDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabricksDefaults")
            .field("host", &self.host)
            .field("token", &redact(&self.token))
            .field("http_path", &self.http_path)
            .field("catalog", &self.catalog)
            .field("schema", &self.schema)
            .finish()
    }
}

impl fmt::Debug for SnowflakeDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeDefaults")
            .field("account", &self.account)
            .field("token", &redact(&self.token))
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .finish()
    }
}

impl BidboardConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BidboardError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| BidboardError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `BIDBOARD_CONFIG` environment variable
    /// 2. `./bidboard.toml` (current directory)
    /// 3. `~/.config/bidboard/config.toml` (user config dir)
    /// 4. Built-in defaults
    ///
    /// `BIDBOARD_DATA_SOURCE`, when set, replaces the file's `data_source`.
    pub fn load_default() -> Self {
        let mut cfg = Self::search_default();
        if let Ok(source) = std::env::var("BIDBOARD_DATA_SOURCE") {
            if !source.trim().is_empty() {
                tracing::info!(data_source = %source, "data source overridden by BIDBOARD_DATA_SOURCE");
                cfg.data_source = source;
            }
        }
        cfg
    }

    fn search_default() -> Self {
        if let Ok(path) = std::env::var("BIDBOARD_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from BIDBOARD_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring BIDBOARD_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("bidboard.toml") {
            tracing::info!("loaded config from ./bidboard.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("bidboard").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Parse the configured data source. Unknown identifiers are fatal.
    pub fn warehouse_kind(&self) -> Result<WarehouseKind> {
        self.data_source.parse()
    }
}
