//! Databricks backend over the SQL Statement Execution API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::{BidboardError, Result};
use crate::executor::{ColumnMeta, TabularResult};
use crate::params::{ConnectionParams, ParamName};
use crate::sql_ast::BoundQuery;

use super::{http_client, map_http_error, WarehouseConnection};

pub struct DatabricksConnection {
    host: String,
    token: SecretString,
    warehouse_id: String,
    catalog: Option<String>,
    schema: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
    client: Client,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    warehouse_id: &'a str,
    statement: &'a str,
    wait_timeout: String,
    on_wait_timeout: &'static str,
    disposition: &'static str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<StatementParameter>,
}

#[derive(Debug, Serialize, PartialEq)]
struct StatementParameter {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(rename = "type")]
    type_name: &'static str,
}

#[derive(Deserialize)]
struct StatementResponse {
    statement_id: Option<String>,
    status: StatementStatus,
    manifest: Option<Manifest>,
    result: Option<ResultData>,
}

#[derive(Deserialize)]
struct StatementStatus {
    state: String,
    error: Option<StatementError>,
}

#[derive(Deserialize)]
struct StatementError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct Manifest {
    schema: Option<SchemaInfo>,
}

#[derive(Deserialize)]
struct SchemaInfo {
    columns: Option<Vec<ColumnInfo>>,
}

#[derive(Deserialize)]
struct ColumnInfo {
    name: String,
    type_name: Option<String>,
}

#[derive(Deserialize)]
struct ResultData {
    data_array: Option<Vec<Vec<Option<String>>>>,
    next_chunk_internal_link: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

impl DatabricksConnection {
    /// Build a connection from resolved parameters. The warehouse id is the
    /// last segment of the HTTP path (`/sql/1.0/warehouses/<id>`).
    pub fn open(mut params: ConnectionParams, query: &QueryConfig) -> Result<Self> {
        let host = params
            .get(ParamName::Host)
            .map(normalize_host)
            .ok_or_else(|| BidboardError::Config("databricks host is not set".to_string()))?;
        let warehouse_id = params
            .get(ParamName::HttpPath)
            .and_then(warehouse_id_from_path)
            .ok_or_else(|| {
                BidboardError::Config("databricks http_path has no warehouse id".to_string())
            })?;
        let catalog = params.get(ParamName::Catalog).map(str::to_string);
        let schema = params.get(ParamName::Schema).map(str::to_string);
        let token = params
            .take_token()
            .ok_or_else(|| BidboardError::Config("databricks token is not set".to_string()))?;

        tracing::info!("opening Databricks connection");
        Ok(Self {
            host,
            token,
            warehouse_id,
            catalog,
            schema,
            timeout: Duration::from_millis(query.timeout_ms),
            poll_interval: Duration::from_millis(query.poll_interval_ms),
            client: http_client(query)?,
        })
    }

    fn base_url(&self) -> String {
        format!("https://{}/api/2.0/sql", self.host)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp
            .json::<ApiError>()
            .await
            .ok()
            .and_then(|e| e.message);
        Err(map_http_error(status.as_u16(), detail))
    }

    /// Poll until the statement leaves PENDING/RUNNING or `deadline` passes,
    /// in which case it is cancelled.
    async fn poll_statement(&self, statement_id: &str, deadline: Instant) -> Result<StatementResponse> {
        let url = format!("{}/statements/{}", self.base_url(), statement_id);

        loop {
            let now = Instant::now();
            if now >= deadline {
                let cancel_url = format!("{}/statements/{}/cancel", self.base_url(), statement_id);
                let _ = self
                    .client
                    .post(&cancel_url)
                    .header("Authorization", self.auth_header())
                    .send()
                    .await;
                return Err(BidboardError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
            tracing::trace!(statement_id, "polling Databricks statement");

            let resp = self
                .client
                .get(&url)
                .header("Authorization", self.auth_header())
                .send()
                .await
                .map_err(|e| BidboardError::Connection(format!("failed to poll statement: {e}")))?;
            let response: StatementResponse = Self::check(resp)
                .await?
                .json()
                .await
                .map_err(|e| BidboardError::Execution(format!("failed to parse poll response: {e}")))?;

            if !matches!(response.status.state.as_str(), "PENDING" | "RUNNING") {
                return Ok(response);
            }
        }
    }

    /// Follow `next_chunk_internal_link` until the whole result is inline.
    async fn fetch_chunk(&self, link: &str) -> Result<ResultData> {
        let url = format!("https://{}{}", self.host, link);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| BidboardError::Connection(format!("failed to fetch result chunk: {e}")))?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| BidboardError::Execution(format!("failed to parse result chunk: {e}")))
    }
}

#[async_trait]
impl WarehouseConnection for DatabricksConnection {
    async fn execute(&self, query: &BoundQuery) -> Result<TabularResult> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let request = StatementRequest {
            warehouse_id: &self.warehouse_id,
            statement: &query.sql,
            wait_timeout: wait_timeout(self.timeout),
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
            catalog: self.catalog.as_deref(),
            schema: self.schema.as_deref(),
            parameters: statement_parameters(&query.params),
        };

        let resp = self
            .client
            .post(format!("{}/statements/", self.base_url()))
            .header("Authorization", self.auth_header())
            .json(&request)
            .send()
            .await
            .map_err(|e| BidboardError::Connection(format!("failed to execute statement: {e}")))?;
        let mut response: StatementResponse = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| BidboardError::Execution(format!("failed to parse response: {e}")))?;

        if matches!(response.status.state.as_str(), "PENDING" | "RUNNING") {
            let statement_id = response.statement_id.clone().ok_or_else(|| {
                BidboardError::Execution("no statement_id in pending response".to_string())
            })?;
            response = self.poll_statement(&statement_id, deadline).await?;
        }

        let mut next_link = response
            .result
            .as_ref()
            .and_then(|r| r.next_chunk_internal_link.clone());
        let (columns, mut rows) = parse_response(response)?;
        while let Some(link) = next_link {
            let chunk = self.fetch_chunk(&link).await?;
            next_link = chunk.next_chunk_internal_link;
            rows.extend(convert_rows(&columns, chunk.data_array.unwrap_or_default()));
        }

        tracing::debug!(
            rows = rows.len(),
            columns = columns.len(),
            ms = start.elapsed().as_millis(),
            "databricks execute"
        );
        TabularResult::new(columns, rows)
    }
}

/// Synchronous wait requested on submit: the statement timeout rounded up to
/// whole seconds, within the 5..=50s range the API accepts.
fn wait_timeout(timeout: Duration) -> String {
    let secs = timeout.as_millis().div_ceil(1000).clamp(5, 50);
    format!("{secs}s")
}

fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

fn warehouse_id_from_path(http_path: &str) -> Option<String> {
    http_path
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Named parameters matching the dialect's `:pN` markers.
fn statement_parameters(values: &[Value]) -> Vec<StatementParameter> {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            let (value, type_name) = match value {
                Value::Null => (None, "STRING"),
                Value::Bool(b) => (Some(b.to_string()), "BOOLEAN"),
                Value::Number(n) if n.is_i64() || n.is_u64() => (Some(n.to_string()), "BIGINT"),
                Value::Number(n) => (Some(n.to_string()), "DOUBLE"),
                Value::String(s) => (Some(s.clone()), "STRING"),
                other => (Some(other.to_string()), "STRING"),
            };
            StatementParameter {
                name: format!("p{}", idx + 1),
                value,
                type_name,
            }
        })
        .collect()
}

fn parse_response(response: StatementResponse) -> Result<(Vec<ColumnMeta>, Vec<Vec<Value>>)> {
    match response.status.state.as_str() {
        "SUCCEEDED" => {}
        "FAILED" => {
            let msg = response
                .status
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(BidboardError::Execution(msg));
        }
        "CANCELED" | "CLOSED" => {
            return Err(BidboardError::Execution(format!(
                "statement was {}",
                response.status.state.to_ascii_lowercase()
            )));
        }
        other => {
            return Err(BidboardError::Execution(format!(
                "unexpected statement state: {other}"
            )));
        }
    }

    let columns: Vec<ColumnMeta> = response
        .manifest
        .and_then(|m| m.schema)
        .and_then(|s| s.columns)
        .unwrap_or_default()
        .into_iter()
        .map(|c| ColumnMeta {
            name: c.name,
            type_name: c.type_name,
        })
        .collect();
    let data = response
        .result
        .and_then(|r| r.data_array)
        .unwrap_or_default();
    let rows = convert_rows(&columns, data);
    Ok((columns, rows))
}

fn convert_rows(columns: &[ColumnMeta], data: Vec<Vec<Option<String>>>) -> Vec<Vec<Value>> {
    data.into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(idx, cell)| {
                    let type_name = columns.get(idx).and_then(|c| c.type_name.as_deref());
                    typed_cell(cell, type_name)
                })
                .collect()
        })
        .collect()
}

/// JSON_ARRAY results carry every cell as a string; restore numbers and booleans.
fn typed_cell(cell: Option<String>, type_name: Option<&str>) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let parsed = match type_name.map(str::to_ascii_uppercase).as_deref() {
        Some("BYTE" | "SHORT" | "INT" | "LONG") => raw.parse::<i64>().ok().map(Value::from),
        Some("FLOAT" | "DOUBLE" | "DECIMAL") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Some("BOOLEAN") => raw.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    parsed.unwrap_or(Value::String(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::request_timeout;
    use crate::backends::test_support::capture_logs;
    use crate::config::WarehouseKind;
    use serde_json::json;

    #[test]
    fn extracts_warehouse_id() {
        assert_eq!(
            warehouse_id_from_path("/sql/1.0/warehouses/abc123/").as_deref(),
            Some("abc123")
        );
        assert_eq!(warehouse_id_from_path(""), None);
        assert_eq!(normalize_host("https://adb.example.net/"), "adb.example.net");
    }

    #[test]
    fn builds_typed_parameters() {
        let params = statement_parameters(&[json!("Spring"), json!(3), json!(1.5), Value::Null]);
        assert_eq!(params[0].name, "p1");
        assert_eq!(params[0].value.as_deref(), Some("Spring"));
        assert_eq!(params[0].type_name, "STRING");
        assert_eq!(params[1].type_name, "BIGINT");
        assert_eq!(params[2].type_name, "DOUBLE");
        assert_eq!(params[3].value, None);
    }

    #[test]
    fn parses_succeeded_response() {
        let response: StatementResponse = serde_json::from_value(json!({
            "statement_id": "01ef",
            "status": {"state": "SUCCEEDED"},
            "manifest": {"schema": {"columns": [
                {"name": "keyword", "type_name": "STRING"},
                {"name": "impressions", "type_name": "LONG"},
                {"name": "roas", "type_name": "DOUBLE"}
            ]}},
            "result": {"data_array": [["crisps", "1200", "2.5"], ["dip", null, "0.75"]]}
        }))
        .unwrap();
        let (columns, rows) = parse_response(response).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(rows[0], vec![json!("crisps"), json!(1200), json!(2.5)]);
        assert_eq!(rows[1][1], Value::Null);
    }

    #[test]
    fn failed_state_carries_message() {
        let response: StatementResponse = serde_json::from_value(json!({
            "status": {"state": "FAILED", "error": {"message": "TABLE_OR_VIEW_NOT_FOUND"}}
        }))
        .unwrap();
        let err = parse_response(response).unwrap_err();
        assert!(matches!(err, BidboardError::Execution(ref m) if m.contains("TABLE_OR_VIEW_NOT_FOUND")));
    }

    #[test]
    fn wait_timeout_follows_statement_timeout() {
        assert_eq!(wait_timeout(Duration::from_millis(5000)), "5s");
        assert_eq!(wait_timeout(Duration::from_millis(1000)), "5s");
        assert_eq!(wait_timeout(Duration::from_millis(12_500)), "13s");
        assert_eq!(wait_timeout(Duration::from_millis(30_000)), "30s");
        assert_eq!(wait_timeout(Duration::from_millis(120_000)), "50s");
    }

    #[test]
    fn submit_wait_ends_before_the_http_request_times_out() {
        for timeout_ms in [0, 1000, 5000, 15_000, 30_000, 49_000, 120_000] {
            let query = QueryConfig {
                timeout_ms,
                ..Default::default()
            };
            let wait = wait_timeout(Duration::from_millis(timeout_ms));
            let wait_secs: u64 = wait.trim_end_matches('s').parse().unwrap();
            assert!(
                Duration::from_secs(wait_secs) < request_timeout(&query),
                "timeout_ms={timeout_ms}"
            );
        }
    }

    #[test]
    fn open_does_not_log_connection_values() {
        let mut params = ConnectionParams::new(WarehouseKind::Databricks);
        params.set(ParamName::Host, "adb-private-host.example.net");
        params.set(ParamName::HttpPath, "/sql/1.0/warehouses/wh0123");
        params.set(ParamName::Token, "dapi-token-value");
        let logs = capture_logs(|| {
            DatabricksConnection::open(params, &QueryConfig::default()).unwrap();
        });
        assert!(logs.contains("opening Databricks connection"));
        assert!(!logs.contains("adb-private-host"));
        assert!(!logs.contains("wh0123"));
        assert!(!logs.contains("dapi-token-value"));
    }

    #[test]
    fn unparseable_numbers_stay_text() {
        assert_eq!(typed_cell(Some("n/a".into()), Some("INT")), json!("n/a"));
        assert_eq!(typed_cell(Some("true".into()), Some("boolean")), json!(true));
    }
}
