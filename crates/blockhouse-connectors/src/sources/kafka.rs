//! Kafka Source
//!
//! Reads a single topic as a member of a consumer group. Offsets are
//! committed manually, one message at a time, after the pipeline has run, so
//! delivery is at-least-once.
//!
//! The rdkafka consumer is compiled only with the `kafka` feature. Without it
//! the configuration still parses, but `connect` fails with
//! `SourceConnectionError`.
//!
//! ## Configuration
//!
//! | Key                   | Description                                     | Default     |
//! |-----------------------|-------------------------------------------------|-------------|
//! | `bootstrap.servers`   | Kafka broker addresses                          | required    |
//! | `topic`               | The one topic to subscribe to                   | required    |
//! | `group.id`            | Consumer group ID                               | required    |
//! | `auto.offset.reset`   | Start position without a commit: `earliest`/`latest` | `latest` |
//! | `poll.timeout.ms`     | How long one poll waits for a message           | `1000`      |
//! | `session.timeout.ms`  | Group session timeout                           | `30000`     |
//! | `security.protocol`   | `PLAINTEXT`, `SASL_SSL`, ...                    | `PLAINTEXT` |
//! | `sasl.mechanism`      | SASL mechanism (e.g. `PLAIN`)                   | (none)      |
//! | `sasl.username`       | SASL username                                   | (none)      |
//! | `sasl.password`       | SASL password                                   | (none)      |

use std::collections::HashMap;

use async_trait::async_trait;
use blockhouse_core::RawMessage;

use crate::config::{parsed_or, required};
use crate::error::{ConnectorError, Result};
use crate::traits::MessageSource;

/// Parsed configuration for the Kafka source.
#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub group_id: String,
    /// `"earliest"` or `"latest"`.
    pub auto_offset_reset: String,
    pub poll_timeout_ms: u64,
    pub session_timeout_ms: u64,
    pub security_protocol: String,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
}

impl KafkaSourceConfig {
    /// Parse a `KafkaSourceConfig` from a string key-value map.
    ///
    /// Required keys: `bootstrap.servers`, `topic`, `group.id`.
    pub fn from_config_map(config: &HashMap<String, String>) -> Result<Self> {
        let bootstrap_servers = required(config, "bootstrap.servers")?;
        let topic = required(config, "topic")?;
        if topic.contains(',') {
            return Err(ConnectorError::ConfigError(format!(
                "'topic' must name exactly one topic, got '{}'",
                topic
            )));
        }
        let group_id = required(config, "group.id")?;

        let auto_offset_reset = config
            .get("auto.offset.reset")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "latest".to_string());

        match auto_offset_reset.as_str() {
            "earliest" | "latest" => {}
            other => {
                return Err(ConnectorError::ConfigError(format!(
                    "invalid auto.offset.reset '{}': must be 'earliest' or 'latest'",
                    other
                )));
            }
        }

        let poll_timeout_ms = parsed_or(config, "poll.timeout.ms", 1000u64)?;
        let session_timeout_ms = parsed_or(config, "session.timeout.ms", 30_000u64)?;

        let security_protocol = config
            .get("security.protocol")
            .cloned()
            .unwrap_or_else(|| "PLAINTEXT".to_string());

        Ok(KafkaSourceConfig {
            bootstrap_servers,
            topic,
            group_id,
            auto_offset_reset,
            poll_timeout_ms,
            session_timeout_ms,
            security_protocol,
            sasl_mechanism: config.get("sasl.mechanism").cloned(),
            sasl_username: config.get("sasl.username").cloned(),
            sasl_password: config.get("sasl.password").cloned(),
        })
    }

    /// Translate into librdkafka client properties.
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![
            ("bootstrap.servers", self.bootstrap_servers.clone()),
            ("group.id", self.group_id.clone()),
            ("enable.auto.commit", "false".to_string()),
            ("enable.auto.offset.store", "false".to_string()),
            ("auto.offset.reset", self.auto_offset_reset.clone()),
            ("session.timeout.ms", self.session_timeout_ms.to_string()),
            ("security.protocol", self.security_protocol.clone()),
        ];
        if let Some(mechanism) = &self.sasl_mechanism {
            props.push(("sasl.mechanism", mechanism.clone()));
        }
        if let Some(username) = &self.sasl_username {
            props.push(("sasl.username", username.clone()));
        }
        if let Some(password) = &self.sasl_password {
            props.push(("sasl.password", password.clone()));
        }
        props
    }
}

/// Run a synchronous librdkafka call without stalling the other tasks on
/// this worker. Falls back to a plain call outside a multi-thread runtime,
/// where `block_in_place` is not allowed.
#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(feature = "kafka")]
mod client {
    use std::time::Duration;

    use rdkafka::config::ClientConfig;
    use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
    use rdkafka::message::Message;
    use rdkafka::{Offset, TopicPartitionList};

    use super::*;

    /// Connected consumer handle.
    pub(super) struct KafkaClient {
        consumer: StreamConsumer,
    }

    impl KafkaClient {
        pub(super) fn connect(config: &KafkaSourceConfig) -> Result<Self> {
            let mut client_config = ClientConfig::new();
            for (key, value) in config.client_properties() {
                client_config.set(key, value);
            }

            let consumer: StreamConsumer = client_config.create().map_err(|e| {
                ConnectorError::SourceConnectionError(format!("failed to create consumer: {}", e))
            })?;

            // librdkafka connects lazily; a metadata round-trip proves the
            // brokers are reachable.
            run_blocking(|| {
                consumer.fetch_metadata(None, Duration::from_millis(config.session_timeout_ms))
            })
            .map_err(|e| {
                    ConnectorError::SourceConnectionError(format!(
                        "brokers {} unreachable: {}",
                        config.bootstrap_servers, e
                    ))
                })?;

            Ok(Self { consumer })
        }

        pub(super) fn subscribe(&self, topic: &str) -> Result<()> {
            self.consumer.subscribe(&[topic]).map_err(|e| {
                ConnectorError::SourceConnectionError(format!(
                    "failed to subscribe to '{}': {}",
                    topic, e
                ))
            })
        }

        pub(super) async fn poll(&self, timeout: Duration) -> Result<Option<RawMessage>> {
            match tokio::time::timeout(timeout, self.consumer.recv()).await {
                Err(_) => Ok(None),
                Ok(Err(e)) => Err(ConnectorError::SourceError(format!("receive failed: {}", e))),
                Ok(Ok(msg)) => Ok(Some(RawMessage::new(
                    msg.topic(),
                    msg.partition().max(0) as u32,
                    msg.offset().to_string(),
                    msg.payload().map(bytes::Bytes::copy_from_slice),
                ))),
            }
        }

        pub(super) fn commit(&self, message: &RawMessage) -> Result<()> {
            let offset: i64 = message.sequence_offset.parse().map_err(|e| {
                ConnectorError::SourceError(format!(
                    "invalid offset '{}': {}",
                    message.sequence_offset, e
                ))
            })?;

            let mut tpl = TopicPartitionList::new();
            tpl.add_partition_offset(
                &message.stream,
                message.partition_id as i32,
                Offset::Offset(offset + 1),
            )
            .map_err(|e| ConnectorError::SourceError(format!("invalid commit position: {}", e)))?;

            run_blocking(|| self.consumer.commit(&tpl, CommitMode::Sync))
                .map_err(|e| ConnectorError::SourceError(format!("commit failed: {}", e)))
        }

        pub(super) fn unsubscribe(&self) {
            self.consumer.unsubscribe();
        }
    }
}

/// Kafka consumer-group source.
pub struct KafkaSource {
    name: String,
    config: KafkaSourceConfig,
    #[cfg(feature = "kafka")]
    client: Option<client::KafkaClient>,
}

impl KafkaSource {
    /// Create a new `KafkaSource` from a config map.
    pub fn new(name: &str, config_map: &HashMap<String, String>) -> Result<Self> {
        let config = KafkaSourceConfig::from_config_map(config_map)?;
        Ok(Self::with_config(name, config))
    }

    /// Create with an already-parsed config.
    pub fn with_config(name: &str, config: KafkaSourceConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            #[cfg(feature = "kafka")]
            client: None,
        }
    }

    pub fn config(&self) -> &KafkaSourceConfig {
        &self.config
    }

    #[cfg(feature = "kafka")]
    fn client(&self) -> Result<&client::KafkaClient> {
        self.client
            .as_ref()
            .ok_or_else(|| ConnectorError::SourceError("source is not connected".to_string()))
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl MessageSource for KafkaSource {
    async fn connect(&mut self) -> Result<()> {
        let client = client::KafkaClient::connect(&self.config)?;
        self.client = Some(client);
        tracing::info!(
            source = %self.name,
            bootstrap_servers = %self.config.bootstrap_servers,
            group_id = %self.config.group_id,
            "Kafka source connected"
        );
        Ok(())
    }

    async fn subscribe(&mut self, stream: &str) -> Result<()> {
        self.client()?.subscribe(stream)?;
        tracing::info!(source = %self.name, topic = %stream, "Kafka source subscribed");
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<RawMessage>> {
        let timeout = std::time::Duration::from_millis(self.config.poll_timeout_ms);
        self.client()?.poll(timeout).await
    }

    async fn acknowledge(&mut self, message: &RawMessage) -> Result<()> {
        self.client()?.commit(message)
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.unsubscribe();
            tracing::info!(source = %self.name, "Kafka source disconnected");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(not(feature = "kafka"))]
#[async_trait]
impl MessageSource for KafkaSource {
    async fn connect(&mut self) -> Result<()> {
        Err(ConnectorError::SourceConnectionError(format!(
            "cannot reach {}: built without the `kafka` feature",
            self.config.bootstrap_servers
        )))
    }

    async fn subscribe(&mut self, _stream: &str) -> Result<()> {
        Err(ConnectorError::SourceError("source is not connected".to_string()))
    }

    async fn next_message(&mut self) -> Result<Option<RawMessage>> {
        Err(ConnectorError::SourceError("source is not connected".to_string()))
    }

    async fn acknowledge(&mut self, _message: &RawMessage) -> Result<()> {
        Err(ConnectorError::SourceError("source is not connected".to_string()))
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config_map() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("bootstrap.servers".to_string(), "localhost:9092".to_string());
        m.insert("topic".to_string(), "grpc1".to_string());
        m.insert("group.id".to_string(), "blockhouse-indexer".to_string());
        m
    }

    // ---------------------------------------------------------------
    // Config parsing
    // ---------------------------------------------------------------

    #[test]
    fn test_config_parse_minimal() {
        let config = KafkaSourceConfig::from_config_map(&base_config_map()).unwrap();
        assert_eq!(config.bootstrap_servers, "localhost:9092");
        assert_eq!(config.topic, "grpc1");
        assert_eq!(config.group_id, "blockhouse-indexer");
        assert_eq!(config.auto_offset_reset, "latest");
        assert_eq!(config.poll_timeout_ms, 1000);
        assert_eq!(config.session_timeout_ms, 30_000);
        assert_eq!(config.security_protocol, "PLAINTEXT");
        assert!(config.sasl_mechanism.is_none());
    }

    #[test]
    fn test_config_parse_all_options() {
        let mut m = base_config_map();
        m.insert("auto.offset.reset".to_string(), "earliest".to_string());
        m.insert("poll.timeout.ms".to_string(), "250".to_string());
        m.insert("security.protocol".to_string(), "SASL_SSL".to_string());
        m.insert("sasl.mechanism".to_string(), "PLAIN".to_string());
        m.insert("sasl.username".to_string(), "admin".to_string());
        m.insert("sasl.password".to_string(), "secret".to_string());

        let config = KafkaSourceConfig::from_config_map(&m).unwrap();
        assert_eq!(config.auto_offset_reset, "earliest");
        assert_eq!(config.poll_timeout_ms, 250);
        assert_eq!(config.sasl_username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_config_missing_required_keys() {
        for key in ["bootstrap.servers", "topic", "group.id"] {
            let mut m = base_config_map();
            m.remove(key);
            let err = KafkaSourceConfig::from_config_map(&m).unwrap_err();
            assert!(err.to_string().contains(key), "{} not named in '{}'", key, err);
        }
    }

    #[test]
    fn test_config_rejects_multiple_topics() {
        let mut m = base_config_map();
        m.insert("topic".to_string(), "a,b".to_string());
        assert!(KafkaSourceConfig::from_config_map(&m).is_err());
    }

    #[test]
    fn test_config_rejects_bad_offset_reset() {
        let mut m = base_config_map();
        m.insert("auto.offset.reset".to_string(), "smallest".to_string());
        assert!(KafkaSourceConfig::from_config_map(&m).is_err());
    }

    #[test]
    fn test_config_rejects_bad_timeout() {
        let mut m = base_config_map();
        m.insert("poll.timeout.ms".to_string(), "soon".to_string());
        assert!(KafkaSourceConfig::from_config_map(&m).is_err());
    }

    // ---------------------------------------------------------------
    // Client properties
    // ---------------------------------------------------------------

    #[test]
    fn test_client_properties_disable_auto_commit() {
        let config = KafkaSourceConfig::from_config_map(&base_config_map()).unwrap();
        let props: HashMap<_, _> = config.client_properties().into_iter().collect();
        assert_eq!(props["enable.auto.commit"], "false");
        assert_eq!(props["auto.offset.reset"], "latest");
        assert_eq!(props["group.id"], "blockhouse-indexer");
        assert!(!props.contains_key("sasl.password"));
    }

    // ---------------------------------------------------------------
    // Blocking client calls
    // ---------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_blocking_call_leaves_worker_to_other_tasks() {
        // The blocked task spawns its peer onto the only worker, then waits
        // for it synchronously. That only completes if the worker is handed
        // off while the call blocks.
        let blocked = tokio::spawn(async {
            let (tx, rx) = std::sync::mpsc::channel();
            tokio::spawn(async move {
                tx.send(()).unwrap();
            });
            run_blocking(|| rx.recv_timeout(std::time::Duration::from_secs(5)))
        });

        assert!(blocked.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_blocking_call_runs_inline_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[test]
    fn test_blocking_call_outside_runtime() {
        assert_eq!(run_blocking(|| "done"), "done");
    }

    #[cfg(not(feature = "kafka"))]
    #[tokio::test]
    async fn test_connect_without_feature_is_connection_error() {
        let mut source = KafkaSource::new("kafka", &base_config_map()).unwrap();
        let err = source.connect().await.unwrap_err();
        assert!(matches!(err, ConnectorError::SourceConnectionError(_)));
        assert!(err.is_fatal_to_loop());
    }
}
