//! Configuration and secrets files on disk feeding parameter resolution.

use std::fs;

use bidboard::runtime::report_table;
use bidboard::{
    BidboardConfig, ConfigProvider, ConnectionFactory, EnvSource, ParamName, SecretsStore,
    WarehouseFactory, WarehouseKind,
};

#[test]
fn config_and_secrets_files_resolve_together() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("bidboard.toml");
    fs::write(
        &config_path,
        r#"
data_source = "Snowflake"

[query]
timeout_ms = 5000

[report]
table = "kw_perf"

[snowflake]
warehouse = "REPORTING_WH"
database = "ADS"
schema = "PUBLIC"
"#,
    )?;
    let secrets_path = dir.path().join("secrets.toml");
    fs::write(
        &secrets_path,
        r#"
[snowflake]
account = "xy12345"
token = "oauth-secret"
database = "ADS_PROD"
"#,
    )?;

    let config = BidboardConfig::from_file(&config_path)?;
    assert_eq!(config.warehouse_kind()?, WarehouseKind::Snowflake);
    assert_eq!(config.query.timeout_ms, 5000);

    let provider = ConfigProvider::new(
        EnvSource::from_pairs([("SNOWFLAKE_SCHEMA", "STAGING")]),
        SecretsStore::from_file(&secrets_path)?,
        config,
    );
    let kind = WarehouseKind::Snowflake;
    assert_eq!(provider.resolve(kind, ParamName::Account).as_deref(), Some("xy12345"));
    assert_eq!(provider.resolve(kind, ParamName::Database).as_deref(), Some("ADS_PROD"));
    assert_eq!(provider.resolve(kind, ParamName::Schema).as_deref(), Some("STAGING"));
    assert_eq!(provider.resolve(kind, ParamName::Warehouse).as_deref(), Some("REPORTING_WH"));
    assert_eq!(provider.resolve(kind, ParamName::Role), None);

    let table = report_table(&provider)?;
    assert_eq!(table.segments(), vec!["ADS_PROD", "STAGING", "kw_perf"]);

    let params = provider.connection_params(kind);
    assert!(!format!("{params:?}").contains("oauth-secret"));
    Ok(())
}

#[tokio::test]
async fn incomplete_credentials_open_no_connection() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let secrets_path = dir.path().join("secrets.toml");
    fs::write(&secrets_path, "[databricks]\nhost = \"adb-1.azuredatabricks.net\"\n")?;

    let provider = ConfigProvider::new(
        EnvSource::default(),
        SecretsStore::from_file(&secrets_path)?,
        BidboardConfig::default(),
    );
    let factory = WarehouseFactory::new(provider)?;
    assert!(factory.connect().await?.is_none());
    Ok(())
}

#[test]
fn malformed_files_are_errors() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.toml");
    fs::write(&path, "data_source = [")?;
    assert!(BidboardConfig::from_file(&path).is_err());
    assert!(SecretsStore::from_file(&path).is_err());
    assert!(BidboardConfig::from_file(dir.path().join("missing.toml")).is_err());
    Ok(())
}
