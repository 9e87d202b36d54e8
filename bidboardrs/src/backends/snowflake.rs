//! Snowflake backend over the SQL API (v2).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::{BidboardError, Result};
use crate::executor::{ColumnMeta, TabularResult};
use crate::params::{ConnectionParams, ParamName};
use crate::sql_ast::BoundQuery;

use super::{http_client, map_http_error, WarehouseConnection};

pub struct SnowflakeConnection {
    account: String,
    token: SecretString,
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    role: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
    client: Client,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Binding {
    #[serde(rename = "type")]
    type_name: &'static str,
    value: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    statement_handle: Option<String>,
    message: Option<String>,
    result_set_meta_data: Option<ResultSetMetaData>,
    data: Option<Vec<Vec<Option<String>>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    scale: Option<i64>,
}

impl SnowflakeConnection {
    pub fn open(mut params: ConnectionParams, query: &QueryConfig) -> Result<Self> {
        let account = params
            .get(ParamName::Account)
            .map(|a| a.trim().to_string())
            .ok_or_else(|| BidboardError::Config("snowflake account is not set".to_string()))?;
        let optional = |p: ParamName| params.get(p).map(str::to_string);
        let warehouse = optional(ParamName::Warehouse);
        let database = optional(ParamName::Database);
        let schema = optional(ParamName::Schema);
        let role = optional(ParamName::Role);
        let token = params
            .take_token()
            .ok_or_else(|| BidboardError::Config("snowflake token is not set".to_string()))?;

        tracing::info!("opening Snowflake connection");
        Ok(Self {
            account,
            token,
            warehouse,
            database,
            schema,
            role,
            timeout: Duration::from_millis(query.timeout_ms),
            poll_interval: Duration::from_millis(query.poll_interval_ms),
            client: http_client(query)?,
        })
    }

    fn base_url(&self) -> String {
        format!("https://{}.snowflakecomputing.com/api/v2/statements", self.account)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(self.token.expose_secret())
            .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
            .header("Accept", "application/json")
    }

    /// Decode a response: 200 is a finished statement, 202 still running.
    async fn read(resp: reqwest::Response) -> Result<(StatusCode, StatementResponse)> {
        let status = resp.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body: StatementResponse = resp
                .json()
                .await
                .map_err(|e| BidboardError::Execution(format!("failed to parse error response: {e}")))?;
            return Err(BidboardError::Execution(
                body.message
                    .unwrap_or_else(|| "statement failed".to_string()),
            ));
        }
        if !status.is_success() {
            let detail = resp
                .json::<StatementResponse>()
                .await
                .ok()
                .and_then(|b| b.message);
            return Err(map_http_error(status.as_u16(), detail));
        }
        let body = resp
            .json()
            .await
            .map_err(|e| BidboardError::Execution(format!("failed to parse response: {e}")))?;
        Ok((status, body))
    }

    async fn poll_statement(&self, handle: &str, deadline: Instant) -> Result<StatementResponse> {
        let url = format!("{}/{}", self.base_url(), handle);
        loop {
            let now = Instant::now();
            if now >= deadline {
                let cancel_url = format!("{}/{}/cancel", self.base_url(), handle);
                let _ = self.request(self.client.post(&cancel_url)).send().await;
                return Err(BidboardError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
            tracing::trace!(handle, "polling Snowflake statement");

            let resp = self
                .request(self.client.get(&url))
                .send()
                .await
                .map_err(|e| BidboardError::Connection(format!("failed to poll statement: {e}")))?;
            let (status, body) = Self::read(resp).await?;
            if status != StatusCode::ACCEPTED {
                return Ok(body);
            }
        }
    }

    async fn fetch_partition(&self, handle: &str, partition: usize) -> Result<Vec<Vec<Option<String>>>> {
        let url = format!("{}/{}?partition={}", self.base_url(), handle, partition);
        let resp = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| BidboardError::Connection(format!("failed to fetch partition: {e}")))?;
        let (_, body) = Self::read(resp).await?;
        Ok(body.data.unwrap_or_default())
    }
}

#[async_trait]
impl WarehouseConnection for SnowflakeConnection {
    async fn execute(&self, query: &BoundQuery) -> Result<TabularResult> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let request = StatementRequest {
            statement: &query.sql,
            timeout: statement_timeout_secs(self.timeout),
            warehouse: self.warehouse.as_deref(),
            database: self.database.as_deref(),
            schema: self.schema.as_deref(),
            role: self.role.as_deref(),
            bindings: bindings(&query.params),
        };

        let resp = self
            .request(self.client.post(self.base_url()))
            .json(&request)
            .send()
            .await
            .map_err(|e| BidboardError::Connection(format!("failed to execute statement: {e}")))?;
        let (status, mut body) = Self::read(resp).await?;

        if status == StatusCode::ACCEPTED {
            let handle = body.statement_handle.clone().ok_or_else(|| {
                BidboardError::Execution("no statementHandle in pending response".to_string())
            })?;
            body = self.poll_statement(&handle, deadline).await?;
        }

        let partitions = body
            .result_set_meta_data
            .as_ref()
            .map(|m| m.partition_info.len())
            .unwrap_or(0);
        let handle = body.statement_handle.clone();
        let (columns, mut rows) = parse_response(body)?;
        if let Some(handle) = handle {
            for partition in 1..partitions {
                let data = self.fetch_partition(&handle, partition).await?;
                rows.extend(convert_rows(&columns, data));
            }
        }

        tracing::debug!(
            rows = rows.len(),
            columns = columns.len(),
            ms = start.elapsed().as_millis(),
            "snowflake execute"
        );
        TabularResult::new(columns, rows)
    }
}

/// Server-side limit in whole seconds, rounded up. Zero would mean no limit.
fn statement_timeout_secs(timeout: Duration) -> u64 {
    let secs = timeout.as_millis().div_ceil(1000).max(1);
    u64::try_from(secs).unwrap_or(u64::MAX)
}

/// Positional bindings matching the dialect's `?` markers.
fn bindings(values: &[Value]) -> BTreeMap<String, Binding> {
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            let binding = match value {
                Value::Null => Binding {
                    type_name: "TEXT",
                    value: None,
                },
                Value::Bool(b) => Binding {
                    type_name: "BOOLEAN",
                    value: Some(b.to_string()),
                },
                Value::Number(n) if n.is_i64() || n.is_u64() => Binding {
                    type_name: "FIXED",
                    value: Some(n.to_string()),
                },
                Value::Number(n) => Binding {
                    type_name: "REAL",
                    value: Some(n.to_string()),
                },
                Value::String(s) => Binding {
                    type_name: "TEXT",
                    value: Some(s.clone()),
                },
                other => Binding {
                    type_name: "TEXT",
                    value: Some(other.to_string()),
                },
            };
            ((idx + 1).to_string(), binding)
        })
        .collect()
}

fn parse_response(body: StatementResponse) -> Result<(Vec<ColumnMeta>, Vec<Vec<Value>>)> {
    let Some(meta) = body.result_set_meta_data else {
        return Err(BidboardError::Execution(
            body.message
                .unwrap_or_else(|| "response has no result set".to_string()),
        ));
    };
    let columns: Vec<ColumnMeta> = meta
        .row_type
        .iter()
        .map(|r| ColumnMeta::typed(r.name.clone(), column_type(r)))
        .collect();
    let rows = convert_rows(&columns, body.data.unwrap_or_default());
    Ok((columns, rows))
}

/// `fixed` columns with a zero scale are integers.
fn column_type(row_type: &RowType) -> String {
    let base = row_type.type_name.to_ascii_lowercase();
    if base == "fixed" && row_type.scale.unwrap_or(0) == 0 {
        "fixed_int".to_string()
    } else {
        base
    }
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

/// The SQL API returns cells as strings; dates arrive as days since epoch and
/// timestamps as fractional epoch seconds.
fn typed_cell(cell: Option<String>, type_name: Option<&str>) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let parsed = match type_name {
        Some("fixed_int") => raw.parse::<i64>().ok().map(Value::from),
        Some("fixed" | "real") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Some("boolean") => raw.parse::<bool>().ok().map(Value::Bool),
        Some("date") => raw
            .parse::<i64>()
            .ok()
            .and_then(|days| NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days)))
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        Some("timestamp_ntz" | "timestamp_ltz") => raw
            .parse::<f64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs.trunc() as i64, 0))
            .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())),
        _ => None,
    };
    parsed.unwrap_or(Value::String(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_support::capture_logs;
    use crate::config::WarehouseKind;
    use serde_json::json;

    #[test]
    fn builds_positional_bindings() {
        let b = bindings(&[json!("Spring"), json!(7)]);
        assert_eq!(
            b["1"],
            Binding {
                type_name: "TEXT",
                value: Some("Spring".to_string())
            }
        );
        assert_eq!(b["2"].type_name, "FIXED");
    }

    #[test]
    fn parses_result_set() {
        let body: StatementResponse = serde_json::from_value(json!({
            "statementHandle": "01b2",
            "resultSetMetaData": {
                "numRows": 2,
                "rowType": [
                    {"name": "WEEK", "type": "date"},
                    {"name": "PRIMARY_VALUE", "type": "fixed", "scale": 0},
                    {"name": "SECONDARY_VALUE", "type": "fixed", "scale": 3}
                ],
                "partitionInfo": [{"rowCount": 2}]
            },
            "data": [["20143", "1500", "2.581"], ["20150", null, "1.000"]]
        }))
        .unwrap();
        let (columns, rows) = parse_response(body).unwrap();
        assert_eq!(columns[0].name, "WEEK");
        assert_eq!(rows[0], vec![json!("2025-02-24"), json!(1500), json!(2.581)]);
        assert_eq!(rows[1][1], Value::Null);
    }

    #[test]
    fn statement_timeout_never_rounds_to_unlimited() {
        assert_eq!(statement_timeout_secs(Duration::from_millis(0)), 1);
        assert_eq!(statement_timeout_secs(Duration::from_millis(500)), 1);
        assert_eq!(statement_timeout_secs(Duration::from_millis(1500)), 2);
        assert_eq!(statement_timeout_secs(Duration::from_millis(30_000)), 30);
    }

    #[test]
    fn open_does_not_log_connection_values() {
        let mut params = ConnectionParams::new(WarehouseKind::Snowflake);
        params.set(ParamName::Account, "xy-private-account");
        params.set(ParamName::Token, "oauth-token-value");
        let logs = capture_logs(|| {
            SnowflakeConnection::open(params, &QueryConfig::default()).unwrap();
        });
        assert!(logs.contains("opening Snowflake connection"));
        assert!(!logs.contains("xy-private-account"));
        assert!(!logs.contains("oauth-token-value"));
    }

    #[test]
    fn missing_result_set_is_an_error() {
        let body: StatementResponse =
            serde_json::from_value(json!({"message": "Statement executed successfully."})).unwrap();
        assert!(parse_response(body).is_err());
    }
}
