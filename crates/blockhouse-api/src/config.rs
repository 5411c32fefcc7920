//! Process configuration from environment variables.
//!
//! | Variable                | Default                        |
//! |-------------------------|--------------------------------|
//! | `KAFKA_BROKERS`         | `localhost:9092`               |
//! | `KAFKA_GROUP_ID`        | `blockhouse-indexer`           |
//! | `KAFKA_TOPIC`           | `grpc1`                        |
//! | `CLICKHOUSE_URL`        | `http://localhost:8123`        |
//! | `CLICKHOUSE_DATABASE`   | `default`                      |
//! | `CLICKHOUSE_USER`       | `default`                      |
//! | `CLICKHOUSE_PASSWORD`   | (empty)                        |
//! | `CLICKHOUSE_TABLE`      | `blocks`                       |
//! | `SCHEMA_PATH`           | `proto/confirmed_block.proto`  |
//! | `SCHEMA_INCLUDE_PATHS`  | (none, comma-separated)        |
//! | `SCHEMA_MESSAGE_TYPES`  | the three reference types      |
//! | `PORT`                  | `3000`                         |
//! | `SHUTDOWN_TIMEOUT_SECS` | `30`                           |

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use blockhouse_connectors::{ClickHouseSinkConfig, ConnectorError, KafkaSourceConfig, Result};
use blockhouse_schema::{SchemaSource, DEFAULT_MESSAGE_TYPES};

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub kafka_brokers: String,
    pub kafka_group_id: String,
    pub kafka_topic: String,
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: String,
    pub clickhouse_password: String,
    pub clickhouse_table: String,
    pub schema_path: PathBuf,
    pub schema_include_paths: Vec<PathBuf>,
    pub schema_message_types: Vec<String>,
    pub port: u16,
    pub shutdown_timeout: Duration,
}

impl IndexerConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Unset and blank variables take
    /// their defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let list = |key: &str| -> Vec<String> {
            lookup(key)
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        let port = get("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConnectorError::ConfigError(format!("invalid PORT: {}", e)))?;

        let shutdown_timeout_secs = get("SHUTDOWN_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| ConnectorError::ConfigError(format!("invalid SHUTDOWN_TIMEOUT_SECS: {}", e)))?;

        let mut schema_message_types = list("SCHEMA_MESSAGE_TYPES");
        if schema_message_types.is_empty() {
            schema_message_types = DEFAULT_MESSAGE_TYPES.iter().map(|s| s.to_string()).collect();
        }

        Ok(IndexerConfig {
            kafka_brokers: get("KAFKA_BROKERS", "localhost:9092"),
            kafka_group_id: get("KAFKA_GROUP_ID", "blockhouse-indexer"),
            kafka_topic: get("KAFKA_TOPIC", "grpc1"),
            clickhouse_url: get("CLICKHOUSE_URL", "http://localhost:8123"),
            clickhouse_database: get("CLICKHOUSE_DATABASE", "default"),
            clickhouse_user: get("CLICKHOUSE_USER", "default"),
            // A blank password is a valid password.
            clickhouse_password: lookup("CLICKHOUSE_PASSWORD").unwrap_or_default(),
            clickhouse_table: get("CLICKHOUSE_TABLE", "blocks"),
            schema_path: PathBuf::from(get("SCHEMA_PATH", "proto/confirmed_block.proto")),
            schema_include_paths: list("SCHEMA_INCLUDE_PATHS")
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            schema_message_types,
            port,
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
        })
    }

    pub fn kafka_config(&self) -> Result<KafkaSourceConfig> {
        let map: HashMap<String, String> = [
            ("bootstrap.servers", self.kafka_brokers.clone()),
            ("topic", self.kafka_topic.clone()),
            ("group.id", self.kafka_group_id.clone()),
            ("auto.offset.reset", "latest".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        KafkaSourceConfig::from_config_map(&map)
    }

    pub fn clickhouse_config(&self) -> Result<ClickHouseSinkConfig> {
        let map: HashMap<String, String> = [
            ("url", self.clickhouse_url.clone()),
            ("database", self.clickhouse_database.clone()),
            ("user", self.clickhouse_user.clone()),
            ("password", self.clickhouse_password.clone()),
            ("table", self.clickhouse_table.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        ClickHouseSinkConfig::from_config_map(&map)
    }

    pub fn schema_source(&self) -> SchemaSource {
        let mut source = SchemaSource::new(&self.schema_path)
            .with_message_types(self.schema_message_types.iter().cloned());
        for include in &self.schema_include_paths {
            source = source.with_include_path(include);
        }
        source
    }
}
