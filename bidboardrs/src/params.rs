//! Connection parameter resolution.
//!
//! Every parameter is looked up in three tiers: the process environment, the
//! secrets file, then the static defaults from [`BidboardConfig`]. The first
//! non-empty value wins.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use secrecy::SecretString;

use crate::config::{BidboardConfig, WarehouseKind};
use crate::error::{BidboardError, Result};

/// Names of the connection parameters understood by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    Host,
    Token,
    HttpPath,
    Catalog,
    Schema,
    Account,
    Warehouse,
    Database,
    Role,
}

impl ParamName {
    /// Key used in the secrets file and the static defaults table.
    pub fn key(&self) -> &'static str {
        match self {
            ParamName::Host => "host",
            ParamName::Token => "token",
            ParamName::HttpPath => "http_path",
            ParamName::Catalog => "catalog",
            ParamName::Schema => "schema",
            ParamName::Account => "account",
            ParamName::Warehouse => "warehouse",
            ParamName::Database => "database",
            ParamName::Role => "role",
        }
    }

    /// Environment variable consulted first, e.g. `DATABRICKS_HTTP_PATH`.
    pub fn env_var(&self, kind: WarehouseKind) -> String {
        format!("{}_{}", kind.id(), self.key()).to_ascii_uppercase()
    }

    /// Parameters a backend accepts.
    pub fn for_backend(kind: WarehouseKind) -> &'static [ParamName] {
        match kind {
            WarehouseKind::Databricks => &[
                ParamName::Host,
                ParamName::HttpPath,
                ParamName::Token,
                ParamName::Catalog,
                ParamName::Schema,
            ],
            WarehouseKind::Snowflake => &[
                ParamName::Account,
                ParamName::Token,
                ParamName::Warehouse,
                ParamName::Database,
                ParamName::Schema,
                ParamName::Role,
            ],
        }
    }
}

/// Snapshot of the environment tier.
#[derive(Clone, Default)]
pub struct EnvSource {
    values: HashMap<String, String>,
}

impl fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort_unstable();
        f.debug_struct("EnvSource").field("vars", &keys).finish()
    }
}

impl EnvSource {
    /// Capture the warehouse variables of the current process.
    pub fn from_process() -> Self {
        let values = std::env::vars()
            .filter(|(k, _)| k.starts_with("DATABRICKS_") || k.starts_with("SNOWFLAKE_"))
            .collect();
        Self { values }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Secrets file tier: one TOML table per backend.
///
/// ```toml
/// [databricks]
/// host = "adb-123.azuredatabricks.net"
/// token = "dapi..."
/// http_path = "/sql/1.0/warehouses/abc123"
/// ```
#[derive(Clone, Default)]
pub struct SecretsStore {
    tables: HashMap<String, HashMap<String, String>>,
}

impl fmt::Debug for SecretsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsStore")
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SecretsStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let root: toml::Table = toml::from_str(toml_str)?;
        let mut tables = HashMap::new();
        for (section, value) in root {
            let toml::Value::Table(entries) = value else {
                continue;
            };
            let values: HashMap<String, String> = entries
                .into_iter()
                .filter_map(|(k, v)| match v {
                    toml::Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect();
            tables.insert(section, values);
        }
        Ok(Self { tables })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Load from default locations; a missing file yields an empty store.
    ///
    /// Search order:
    /// 1. `BIDBOARD_SECRETS` environment variable
    /// 2. `./.bidboard/secrets.toml`
    /// 3. `~/.config/bidboard/secrets.toml`
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("BIDBOARD_SECRETS") {
            match Self::from_file(&path) {
                Ok(store) => {
                    tracing::info!(path = %path, "loaded secrets from BIDBOARD_SECRETS");
                    return store;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring BIDBOARD_SECRETS"),
            }
        }

        let local = Path::new(".bidboard").join("secrets.toml");
        if let Ok(store) = Self::from_file(&local) {
            tracing::info!("loaded secrets from ./.bidboard/secrets.toml");
            return store;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_secrets = config_dir.join("bidboard").join("secrets.toml");
            if let Ok(store) = Self::from_file(&user_secrets) {
                tracing::info!(path = %user_secrets.display(), "loaded secrets from user config dir");
                return store;
            }
        }

        tracing::debug!("no secrets file found");
        Self::empty()
    }

    pub fn get(&self, kind: WarehouseKind, key: &str) -> Option<&str> {
        self.tables
            .get(kind.id())
            .and_then(|t| t.get(key))
            .map(String::as_str)
    }
}

impl BidboardConfig {
    /// Static default tier lookup.
    pub fn static_default(&self, kind: WarehouseKind, param: ParamName) -> Option<&str> {
        let value = match (kind, param) {
            (WarehouseKind::Databricks, ParamName::Host) => &self.databricks.host,
            (WarehouseKind::Databricks, ParamName::Token) => &self.databricks.token,
            (WarehouseKind::Databricks, ParamName::HttpPath) => &self.databricks.http_path,
            (WarehouseKind::Databricks, ParamName::Catalog) => &self.databricks.catalog,
            (WarehouseKind::Databricks, ParamName::Schema) => &self.databricks.schema,
            (WarehouseKind::Snowflake, ParamName::Account) => &self.snowflake.account,
            (WarehouseKind::Snowflake, ParamName::Token) => &self.snowflake.token,
            (WarehouseKind::Snowflake, ParamName::Warehouse) => &self.snowflake.warehouse,
            (WarehouseKind::Snowflake, ParamName::Database) => &self.snowflake.database,
            (WarehouseKind::Snowflake, ParamName::Schema) => &self.snowflake.schema,
            (WarehouseKind::Snowflake, ParamName::Role) => &self.snowflake.role,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Resolves connection parameters across the environment, secrets and static tiers.
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    env: EnvSource,
    secrets: SecretsStore,
    config: BidboardConfig,
}

impl ConfigProvider {
    pub fn new(env: EnvSource, secrets: SecretsStore, config: BidboardConfig) -> Self {
        Self {
            env,
            secrets,
            config,
        }
    }

    /// Provider over the live process environment and the default secrets file.
    pub fn from_environment(config: BidboardConfig) -> Self {
        Self::new(EnvSource::from_process(), SecretsStore::load_default(), config)
    }

    pub fn config(&self) -> &BidboardConfig {
        &self.config
    }

    /// Resolve one parameter. Returns `None` when no tier has a non-empty value.
    pub fn resolve(&self, kind: WarehouseKind, param: ParamName) -> Option<String> {
        let env_var = param.env_var(kind);
        let tiers = [
            ("env", self.env.get(&env_var)),
            ("secrets", self.secrets.get(kind, param.key())),
            ("default", self.config.static_default(kind, param)),
        ];
        tiers.into_iter().find_map(|(tier, value)| {
            let value = value.map(str::trim).filter(|v| !v.is_empty())?;
            tracing::trace!(backend = %kind, param = param.key(), tier, "resolved parameter");
            Some(value.to_string())
        })
    }

    /// Resolve every parameter the backend accepts for one connection attempt.
    pub fn connection_params(&self, kind: WarehouseKind) -> ConnectionParams {
        let mut params = ConnectionParams::new(kind);
        for &param in ParamName::for_backend(kind) {
            if let Some(value) = self.resolve(kind, param) {
                params.set(param, value);
            }
        }
        params
    }
}

/// Resolved parameters held for the duration of a single connection attempt.
pub struct ConnectionParams {
    kind: WarehouseKind,
    values: HashMap<ParamName, String>,
    token: Option<SecretString>,
}

impl ConnectionParams {
    pub fn new(kind: WarehouseKind) -> Self {
        Self {
            kind,
            values: HashMap::new(),
            token: None,
        }
    }

    pub fn kind(&self) -> WarehouseKind {
        self.kind
    }

    pub fn set(&mut self, param: ParamName, value: impl Into<String>) {
        let value = value.into();
        if param == ParamName::Token {
            self.token = Some(SecretString::from(value));
        } else {
            self.values.insert(param, value);
        }
    }

    /// Non-secret parameter value. The token is only reachable through [`Self::token`].
    pub fn get(&self, param: ParamName) -> Option<&str> {
        self.values.get(&param).map(String::as_str)
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Move the token out, e.g. into the connection that will use it.
    pub fn take_token(&mut self) -> Option<SecretString> {
        self.token.take()
    }

    fn is_set(&self, param: ParamName) -> bool {
        match param {
            ParamName::Token => self.token.is_some(),
            other => self.values.contains_key(&other),
        }
    }

    /// Fail with [`BidboardError::MissingCredentials`] naming every absent parameter.
    pub fn require(&self, required: &[ParamName]) -> Result<()> {
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|p| !self.is_set(**p))
            .map(|p| p.key())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BidboardError::MissingCredentials {
                backend: self.kind.display_name().to_string(),
                missing,
            })
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().map(|p| p.key()).collect();
        keys.sort_unstable();
        f.debug_struct("ConnectionParams")
            .field("kind", &self.kind)
            .field("set", &keys)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
