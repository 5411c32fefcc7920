//! Blockhouse Indexer Binary
//!
//! Consumes one Kafka topic, decodes each message through the schema
//! cascade and appends one row per message to ClickHouse, while serving the
//! admin API.
//!
//! # Environment Variables
//!
//! See [`blockhouse_api::config`] for the full list. In short:
//!
//! - `KAFKA_BROKERS`, `KAFKA_GROUP_ID`, `KAFKA_TOPIC`
//! - `CLICKHOUSE_URL`, `CLICKHOUSE_DATABASE`, `CLICKHOUSE_USER`,
//!   `CLICKHOUSE_PASSWORD`, `CLICKHOUSE_TABLE`
//! - `SCHEMA_PATH`, `SCHEMA_INCLUDE_PATHS`, `SCHEMA_MESSAGE_TYPES`
//! - `PORT` (default: 3000)
//! - `RUST_LOG`: Log level (default: info)
//!
//! # Example
//!
//! ```bash
//! export KAFKA_BROKERS=localhost:9092
//! export CLICKHOUSE_URL=http://localhost:8123
//! cargo run --features kafka --bin blockhouse
//! ```
//!
//! # Exit status
//!
//! Non-zero when the configuration is invalid, the store client cannot be
//! built or the HTTP port cannot be bound. A consumer loop that stops on a
//! source connection error is logged but does not stop the process; the
//! admin API keeps serving.
//!
//! # Features
//!
//! Consuming needs the `kafka` feature (librdkafka). A default build has no
//! Kafka client: the consumer loop stops at startup with a source connection
//! error and only the admin API runs.

use std::process::ExitCode;
use std::sync::Arc;

use blockhouse_api::shutdown::{
    serve_with_shutdown, shutdown_signal, GracefulShutdown, ShutdownHandle,
};
use blockhouse_api::{create_router, AppState, IndexerConfig, ServiceInfo};
use blockhouse_connectors::{
    ClickHouseSink, IngestLoop, IngestPipeline, IngestSink, KafkaSource,
};
use blockhouse_schema::SchemaRegistry;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> ExitCode {
    // Setup logging
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "indexer failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Blockhouse indexer starting...");

    let config = IndexerConfig::from_env()?;
    info!("Configuration:");
    info!("  Kafka: {} (topic {}, group {})", config.kafka_brokers, config.kafka_topic, config.kafka_group_id);
    info!("  ClickHouse: {} (table {}.{})", config.clickhouse_url, config.clickhouse_database, config.clickhouse_table);
    info!("  Schema: {}", config.schema_path.display());
    info!("  Port: {}", config.port);

    // Store client. Failing to build it is fatal; failing to create the
    // table is not, the admin API reports store errors per request.
    let sink: Arc<dyn IngestSink> =
        Arc::new(ClickHouseSink::with_config("clickhouse", config.clickhouse_config()?)?);
    if let Err(e) = sink.ensure_schema().await {
        error!(error = %e, "failed to initialize ClickHouse table");
    }

    let registry = Arc::new(SchemaRegistry::load_or_empty(&config.schema_source()));
    if !registry.is_ready() {
        warn!("no schemas loaded; messages will be decoded as JSON or captured raw");
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    let source = KafkaSource::with_config("kafka", config.kafka_config()?);
    let pipeline = IngestPipeline::new(registry.clone(), sink.clone());
    let ingest = IngestLoop::new(Box::new(source), pipeline, &config.kafka_topic);

    let state = AppState {
        sink: sink.clone(),
        registry,
        loop_status: ingest.status(),
        info: Arc::new(ServiceInfo::from(&config)),
    };

    let graceful = GracefulShutdown::with_timeout(config.shutdown_timeout);
    let shutdown = ShutdownHandle::new();

    let loop_task = {
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = ingest.run(rx).await;
            if let Err(e) = &result {
                error!(error = %e, "consumer loop stopped; admin API stays up");
            }
            result
        })
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let signal = shutdown_signal().await;
            shutdown.trigger(signal);
        });
    }

    serve_with_shutdown(listener, create_router(state), shutdown.clone()).await?;

    match tokio::time::timeout(graceful.timeout, loop_task).await {
        Ok(Ok(Ok(()))) => info!("consumer loop drained"),
        Ok(Ok(Err(_))) => {}
        Ok(Err(e)) => error!(error = %e, "consumer loop task panicked"),
        Err(_) => warn!(timeout = ?graceful.timeout, "consumer loop did not drain in time"),
    }

    if let Err(e) = sink.close().await {
        warn!(error = %e, "error closing sink");
    }

    info!("Blockhouse indexer stopped");
    Ok(())
}
