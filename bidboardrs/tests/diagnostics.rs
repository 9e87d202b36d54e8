//! Operator diagnostics against a scripted warehouse.

mod common;

use std::sync::Arc;

use bidboard::{Bidboard, FailureKind, TablePath};
use common::{table, FakeFactory};
use serde_json::json;

fn wire(factory: FakeFactory) -> (Bidboard, Arc<common::CallLog>) {
    let log = factory.log.clone();
    let table = TablePath::new(Some("default"), Some("bid_sample"), "keyword_performance").unwrap();
    (Bidboard::with_factory(Arc::new(factory), table), log)
}

#[tokio::test]
async fn connection_test_runs_select_one() {
    let (app, log) = wire(FakeFactory::returning(table(&["1"], vec![vec![json!(1)]])));
    assert!(app.diagnostics.test_connection().await);
    assert_eq!(log.sql(), vec!["SELECT 1"]);
    assert_eq!(app.diagnostics.data_source_name(), "Databricks");
}

#[tokio::test]
async fn connection_test_swallows_failures() {
    let (app, _) = wire(FakeFactory::failing("warehouse stopped"));
    assert!(!app.diagnostics.test_connection().await);

    let (app, _) = wire(FakeFactory::unavailable());
    assert!(!app.diagnostics.test_connection().await);
}

#[tokio::test]
async fn list_tables_is_scoped_to_configured_schema() {
    let (app, log) = wire(FakeFactory::returning(table(&["tableName"], vec![])));
    assert!(!app.diagnostics.list_tables().await.is_failure());
    assert_eq!(log.sql(), vec!["SHOW TABLES IN default.bid_sample"]);
}

#[tokio::test]
async fn sample_rows_validates_table_name() {
    let (app, log) = wire(FakeFactory::returning(table(&["Key", "Imp"], vec![])));

    let outcome = app.diagnostics.sample_rows("campaigns; DROP TABLE x", 10).await;
    assert_eq!(outcome.failure().map(|f| f.kind), Some(FailureKind::Configuration));
    assert_eq!(log.opened(), 0);

    let columns = app.diagnostics.column_names("campaigns").await;
    assert_eq!(columns, vec!["Key", "Imp"]);
    assert_eq!(
        log.sql(),
        vec!["SELECT * FROM default.bid_sample.campaigns LIMIT 1"]
    );
}

#[tokio::test]
async fn custom_sql_passes_through() {
    let (app, log) = wire(FakeFactory::returning(table(&["n"], vec![vec![json!(3)]])));
    let outcome = app.diagnostics.run_custom("SELECT count(*) AS n FROM x").await;
    assert_eq!(outcome.table().map(|t| t.row_count()), Some(1));
    assert_eq!(log.sql(), vec!["SELECT count(*) AS n FROM x"]);
}
