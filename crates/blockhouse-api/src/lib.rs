//! Blockhouse Admin API
//!
//! HTTP/JSON surface for inspecting and administering the indexer while its
//! consumer loop runs:
//!
//! | Route             | Purpose                                           |
//! |-------------------|---------------------------------------------------|
//! | `GET /`           | Service info and whether schemas loaded           |
//! | `GET /stats`      | Total, schema-decoded and decode-success counts   |
//! | `GET /blocks`     | Most recent records (`?limit=N`, default 10, max 1000) |
//! | `DELETE /blocks`  | Remove every stored record                        |
//! | `GET /consumer`   | Consumer loop state and counters                  |
//! | `GET /health`     | Liveness                                          |
//! | `GET /ready`      | Readiness (store reachable)                       |
//!
//! Store failures are answered with a 500 and an [`models::ErrorResponse`]
//! body. The surface stays up when the consumer loop has stopped.

use std::sync::Arc;

use axum::{routing::get, Router};
use blockhouse_connectors::{IngestSink, LoopStatus};
use blockhouse_schema::SchemaRegistry;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod handlers;
pub mod models;
pub mod shutdown;

pub use config::IndexerConfig;

/// Static description of where the indexer reads from and writes to.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub topic: String,
    pub broker: String,
    pub clickhouse: String,
    pub table: String,
}

impl From<&IndexerConfig> for ServiceInfo {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            topic: config.kafka_topic.clone(),
            broker: config.kafka_brokers.clone(),
            clickhouse: config.clickhouse_url.clone(),
            table: config.clickhouse_table.clone(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<dyn IngestSink>,
    pub registry: Arc<SchemaRegistry>,
    pub loop_status: Arc<LoopStatus>,
    pub info: Arc<ServiceInfo>,
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::service::info))
        .route("/stats", get(handlers::stats::get_stats))
        .route(
            "/blocks",
            get(handlers::blocks::list_blocks).delete(handlers::blocks::clear_blocks),
        )
        .route("/consumer", get(handlers::service::consumer_status))
        .route("/health", get(handlers::service::health))
        .route("/ready", get(handlers::service::readiness))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
