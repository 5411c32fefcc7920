//! ClickHouse Sink
//!
//! Appends records to a ClickHouse table through the HTTP interface. Each
//! append is one `INSERT ... FORMAT JSONEachRow` request carrying one row;
//! there is no client-side batching, so a successful append is durable.
//!
//! ## Configuration
//!
//! | Key                  | Description                          | Default                 |
//! |----------------------|--------------------------------------|-------------------------|
//! | `url`                | HTTP interface base URL              | `http://localhost:8123` |
//! | `database`           | Database name                        | `default`               |
//! | `user`               | User name                            | `default`               |
//! | `password`           | Password                             | (empty)                 |
//! | `table`              | Target table                         | `blocks`                |
//! | `request.timeout.ms` | Per-request timeout                  | `30000`                 |
//!
//! ## Table
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS blocks (
//!     timestamp DateTime64(3, 'UTC'),
//!     topic String,
//!     partition UInt32,
//!     offset String,
//!     message_type String,
//!     decoded_data String,
//!     is_protobuf Bool,
//!     decode_success Bool
//! ) ENGINE = MergeTree()
//! ORDER BY (timestamp, topic, partition, offset)
//! ```
//!
//! `offset` is a `String`, so the ordering key sorts it lexically. Rows are
//! never deduplicated; redelivered messages appear twice.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use blockhouse_core::IngestRecord;
use serde_json::Value;

use crate::config::{identifier, parsed_or};
use crate::error::{ConnectorError, Result};
use crate::traits::{IngestSink, RecordFilter};

/// Columns in table order.
pub const COLUMNS: [&str; 8] = [
    "timestamp",
    "topic",
    "partition",
    "offset",
    "message_type",
    "decoded_data",
    "is_protobuf",
    "decode_success",
];

/// Parsed configuration for the ClickHouse sink.
#[derive(Debug, Clone)]
pub struct ClickHouseSinkConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub table: String,
    pub request_timeout_ms: u64,
}

impl ClickHouseSinkConfig {
    /// Parse a `ClickHouseSinkConfig` from a string key-value map. Every key
    /// has a default.
    pub fn from_config_map(config: &HashMap<String, String>) -> Result<Self> {
        let url = config
            .get("url")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://localhost:8123".to_string());

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConnectorError::ConfigError(format!(
                "invalid url '{}': expected http:// or https://",
                url
            )));
        }

        Ok(ClickHouseSinkConfig {
            url,
            database: identifier(config, "database", "default")?,
            user: config
                .get("user")
                .cloned()
                .unwrap_or_else(|| "default".to_string()),
            password: config.get("password").cloned().unwrap_or_default(),
            table: identifier(config, "table", "blocks")?,
            request_timeout_ms: parsed_or(config, "request.timeout.ms", 30_000u64)?,
        })
    }
}

/// Idempotent DDL for `table`.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         timestamp DateTime64(3, 'UTC'), \
         topic String, \
         partition UInt32, \
         offset String, \
         message_type String, \
         decoded_data String, \
         is_protobuf Bool, \
         decode_success Bool\
         ) ENGINE = MergeTree() \
         ORDER BY (timestamp, topic, partition, offset)",
        table
    )
}

pub fn insert_sql(table: &str) -> String {
    format!("INSERT INTO {} FORMAT JSONEachRow", table)
}

pub fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {}", table)
}

pub fn count_sql(table: &str, filter: RecordFilter) -> String {
    let predicate = match filter {
        RecordFilter::All => "",
        RecordFilter::SchemaDecoded => " WHERE is_protobuf = true",
        RecordFilter::DecodeSucceeded => " WHERE decode_success = true",
    };
    format!(
        "SELECT count() AS count FROM {}{} FORMAT JSONEachRow",
        table, predicate
    )
}

pub fn recent_sql(table: &str, limit: usize) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY timestamp DESC LIMIT {} FORMAT JSONEachRow",
        COLUMNS.join(", "),
        table,
        limit
    )
}

/// Read the `count` column from a one-row `JSONEachRow` response.
///
/// ClickHouse quotes 64-bit integers in JSON output by default, so both
/// `"12"` and `12` are accepted.
pub fn parse_count(body: &str) -> Result<u64> {
    let line = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if line.is_empty() {
        return Ok(0);
    }

    let row: Value = serde_json::from_str(line)?;
    match row.get("count") {
        Some(Value::String(s)) => s.parse::<u64>().map_err(|e| {
            ConnectorError::SerializationError(format!("invalid count '{}': {}", s, e))
        }),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            ConnectorError::SerializationError(format!("invalid count {}", n))
        }),
        _ => Err(ConnectorError::SerializationError(format!(
            "missing count in response '{}'",
            line
        ))),
    }
}

/// Parse a `JSONEachRow` response body into records.
pub fn parse_rows(body: &str) -> Result<Vec<IngestRecord>> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<IngestRecord>(l).map_err(ConnectorError::from))
        .collect()
}

/// ClickHouse sink over the HTTP interface.
pub struct ClickHouseSink {
    name: String,
    config: ClickHouseSinkConfig,
    client: reqwest::Client,
}

impl ClickHouseSink {
    /// Create a new `ClickHouseSink` from a config map.
    pub fn new(name: &str, config_map: &HashMap<String, String>) -> Result<Self> {
        let config = ClickHouseSinkConfig::from_config_map(config_map)?;
        Self::with_config(name, config)
    }

    /// Create with an already-parsed config.
    ///
    /// Fails only if the HTTP client cannot be constructed.
    pub fn with_config(name: &str, config: ClickHouseSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ConnectorError::StoreError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            config,
            client,
        })
    }

    pub fn config(&self) -> &ClickHouseSinkConfig {
        &self.config
    }

    /// Run a statement sent as the request body, returning the response body.
    async fn execute(&self, sql: &str) -> Result<String> {
        let request = self
            .client
            .post(&self.config.url)
            .query(&[("database", self.config.database.as_str())])
            .body(sql.to_string());
        self.send(request, sql).await
    }

    /// Insert `rows` (newline-delimited JSON) with `sql` in the query string.
    async fn insert(&self, sql: &str, rows: String) -> Result<String> {
        let request = self
            .client
            .post(&self.config.url)
            .query(&[("database", self.config.database.as_str()), ("query", sql)])
            .body(rows);
        self.send(request, sql).await
    }

    async fn send(&self, request: reqwest::RequestBuilder, sql: &str) -> Result<String> {
        let response = request
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .send()
            .await
            .map_err(|e| ConnectorError::StoreError(format!("ClickHouse request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ConnectorError::StoreError(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::debug!(sink = %self.name, %status, query = %sql, "ClickHouse rejected query");
            return Err(ConnectorError::StoreError(format!(
                "ClickHouse returned {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl IngestSink for ClickHouseSink {
    async fn ensure_schema(&self) -> Result<()> {
        self.execute(&create_table_sql(&self.config.table)).await?;
        tracing::info!(sink = %self.name, table = %self.config.table, "ClickHouse table ready");
        Ok(())
    }

    async fn append(&self, record: &IngestRecord) -> Result<()> {
        let row = record.to_json_row()?;
        self.insert(&insert_sql(&self.config.table), row).await?;
        tracing::debug!(
            sink = %self.name,
            topic = %record.stream(),
            partition = record.partition_id(),
            offset = %record.sequence_offset(),
            "record written to ClickHouse"
        );
        Ok(())
    }

    async fn truncate(&self) -> Result<()> {
        self.execute(&truncate_sql(&self.config.table)).await?;
        tracing::info!(sink = %self.name, table = %self.config.table, "ClickHouse table cleared");
        Ok(())
    }

    async fn count(&self, filter: RecordFilter) -> Result<u64> {
        let body = self.execute(&count_sql(&self.config.table, filter)).await?;
        parse_count(&body)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<IngestRecord>> {
        let body = self.execute(&recent_sql(&self.config.table, limit)).await?;
        parse_rows(&body)
    }

    async fn close(&self) -> Result<()> {
        tracing::info!(sink = %self.name, "ClickHouse sink closed");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
