//! Databricks SQL warehouse client
//!
//! Uses the SQL Statement Execution API with inline JSON_ARRAY results. Every value
//! comes back as a string (or null); [`Record`] accessors do the coercion.
//!
//! Statements that outlive the synchronous wait keep running on the warehouse and are
//! polled until they reach a terminal state or the configured timeout expires.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{Dialect, Record, SqlValue, Statement, Warehouse};
use crate::error::{Error, Result};
use crate::time::format_timestamp;

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

/// Longest synchronous wait the API accepts before answering PENDING/RUNNING
const MAX_WAIT_SECS: u64 = 30;

/// Shortest non-zero wait the API accepts
const MIN_WAIT_SECS: u64 = 5;

/// Delay before the first status poll; doubles up to `MAX_POLL_INTERVAL`
const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Synchronous wait that still leaves the HTTP request inside `timeout`
fn wait_timeout(timeout: Duration) -> String {
    let secs = timeout.as_secs().saturating_sub(1).min(MAX_WAIT_SECS);
    if secs < MIN_WAIT_SECS {
        "0s".to_string()
    } else {
        format!("{}s", secs)
    }
}

/// SUCCEEDED, FAILED, CANCELED and CLOSED end a statement; PENDING and RUNNING do not
fn is_terminal(state: &str) -> bool {
    matches!(state, "SUCCEEDED" | "FAILED" | "CANCELED" | "CLOSED")
}

/// Connection details for a Databricks workspace
#[derive(Debug, Clone)]
pub struct WarehouseSettings {
    pub host: String,
    pub token: String,
    pub warehouse_id: String,
    pub timeout: Duration,
}

/// Normalise a workspace host to `scheme://host` without a trailing slash
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// HTTP client shared by the Databricks-facing clients
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("review-validator/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Connection(e.to_string()))
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    parameters: Vec<StatementParameter>,
    wait_timeout: String,
    disposition: &'static str,
    format: &'static str,
    on_wait_timeout: &'static str,
}

#[derive(Debug, Serialize)]
struct StatementParameter {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(rename = "type")]
    type_name: &'static str,
}

impl StatementParameter {
    fn new(name: &str, value: &SqlValue) -> Self {
        let (value, type_name) = match value {
            SqlValue::Null => (None, "STRING"),
            SqlValue::Bool(b) => (Some(b.to_string()), "BOOLEAN"),
            SqlValue::Int(i) => (Some(i.to_string()), "BIGINT"),
            SqlValue::Float(f) => (Some(f.to_string()), "DOUBLE"),
            SqlValue::Text(s) => (Some(s.clone()), "STRING"),
            SqlValue::Timestamp(ts) => (Some(format_timestamp(ts)), "TIMESTAMP"),
        };
        Self {
            name: name.to_string(),
            value,
            type_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    statement_id: Option<String>,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    schema: Option<Schema>,
}

#[derive(Debug, Deserialize)]
struct Schema {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

/// Warehouse reached over the Databricks REST API
pub struct DatabricksWarehouse {
    http_client: reqwest::Client,
    host: String,
    token: String,
    warehouse_id: String,
    timeout: Duration,
}

impl DatabricksWarehouse {
    pub fn new(settings: WarehouseSettings) -> Result<Self> {
        if settings.warehouse_id.trim().is_empty() {
            return Err(Error::Config("Databricks warehouse id is required".to_string()));
        }

        Ok(Self {
            http_client: http_client(settings.timeout)?,
            host: normalize_host(&settings.host),
            token: settings.token,
            warehouse_id: settings.warehouse_id,
            timeout: settings.timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn check_status(response: reqwest::Response, sql: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Connection(format!(
                "Databricks rejected credentials ({}): {}",
                status.as_u16(),
                body
            )));
        }

        Err(Error::query(
            format!("Databricks API error {}: {}", status.as_u16(), body),
            sql,
        ))
    }

    async fn fetch_statement(&self, statement_id: &str, sql: &str) -> Result<StatementResponse> {
        let url = format!("{}{}/{}", self.host, STATEMENTS_PATH, statement_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        Self::check_status(response, sql)
            .await?
            .json::<StatementResponse>()
            .await
            .map_err(|e| Error::Conversion(format!("Invalid statement response: {}", e)))
    }

    /// Ask the warehouse to stop a statement we gave up on
    async fn cancel(&self, statement_id: &str) {
        let url = format!("{}{}/{}/cancel", self.host, STATEMENTS_PATH, statement_id);
        let result = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        if let Err(e) = result {
            warn!(statement_id, error = %e, "Failed to cancel Databricks statement");
        }
    }

    /// Poll a PENDING/RUNNING statement until it ends or `deadline` passes
    async fn wait_for_completion(
        &self,
        mut body: StatementResponse,
        sql: &str,
        deadline: Instant,
    ) -> Result<StatementResponse> {
        let mut interval = INITIAL_POLL_INTERVAL;

        while !is_terminal(&body.status.state) {
            let Some(statement_id) = body.statement_id.clone() else {
                return Err(Error::query(
                    format!("statement in state {} has no id to poll", body.status.state),
                    sql,
                ));
            };

            if Instant::now() + interval > deadline {
                warn!(
                    statement_id = %statement_id,
                    state = %body.status.state,
                    "Databricks statement still running at timeout; cancelling"
                );
                self.cancel(&statement_id).await;
                return Err(Error::query(
                    format!(
                        "statement {} still {} after {}s",
                        statement_id,
                        body.status.state,
                        self.timeout.as_secs()
                    ),
                    sql,
                ));
            }

            debug!(statement_id = %statement_id, state = %body.status.state, "Waiting for statement");
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
            body = self.fetch_statement(&statement_id, sql).await?;
        }

        Ok(body)
    }

    async fn fetch_chunk(&self, link: &str, sql: &str) -> Result<ResultChunk> {
        let url = format!("{}{}", self.host, link);
        debug!(url = %url, "Fetching result chunk");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        Self::check_status(response, sql)
            .await?
            .json::<ResultChunk>()
            .await
            .map_err(|e| Error::Conversion(format!("Invalid result chunk: {}", e)))
    }
}

fn records_from(columns: &[String], data: Vec<Vec<Value>>) -> impl Iterator<Item = Record> + '_ {
    data.into_iter().map(move |row| {
        columns
            .iter()
            .cloned()
            .zip(row.into_iter().chain(std::iter::repeat(Value::Null)))
            .collect()
    })
}

#[async_trait]
impl Warehouse for DatabricksWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Databricks
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Record>> {
        let rendered = statement.render_inline();
        let deadline = Instant::now() + self.timeout;
        let request = StatementRequest {
            statement: &statement.sql,
            warehouse_id: &self.warehouse_id,
            parameters: statement
                .params
                .iter()
                .map(|(name, value)| StatementParameter::new(name, value))
                .collect(),
            wait_timeout: wait_timeout(self.timeout),
            disposition: "INLINE",
            format: "JSON_ARRAY",
            on_wait_timeout: "CONTINUE",
        };

        debug!(sql = %rendered, "Executing Databricks statement");

        let response = self
            .http_client
            .post(format!("{}{}", self.host, STATEMENTS_PATH))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let body: StatementResponse = Self::check_status(response, &rendered)
            .await?
            .json()
            .await
            .map_err(|e| Error::Conversion(format!("Invalid statement response: {}", e)))?;

        if !is_terminal(&body.status.state) {
            info!(
                statement_id = ?body.statement_id,
                state = %body.status.state,
                "Databricks statement still running; polling"
            );
        }
        let body = self.wait_for_completion(body, &rendered, deadline).await?;

        match body.status.state.as_str() {
            "SUCCEEDED" => {}
            state => {
                let (code, message) = body
                    .status
                    .error
                    .map(|e| (e.error_code, e.message))
                    .unwrap_or((None, None));
                let message = message.unwrap_or_else(|| format!("statement ended in state {}", state));
                warn!(
                    statement_id = ?body.statement_id,
                    state = %state,
                    error_code = ?code,
                    sql = %rendered,
                    "Databricks statement did not succeed"
                );
                return Err(Error::query(message, rendered));
            }
        }

        let columns: Vec<String> = body
            .manifest
            .and_then(|m| m.schema)
            .map(|s| s.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();

        let mut chunk = body.result.unwrap_or_default();
        let mut records = Vec::new();
        loop {
            records.extend(records_from(&columns, chunk.data_array.take().unwrap_or_default()));
            match chunk.next_chunk_internal_link.take() {
                Some(link) => chunk = self.fetch_chunk(&link, &rendered).await?,
                None => break,
            }
        }

        Ok(records)
    }
}
