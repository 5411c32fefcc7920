//! Service info, health and consumer loop status

use axum::{extract::State, http::StatusCode, Json};
use blockhouse_connectors::{LoopStats, RecordFilter};

use crate::models::{HealthResponse, InfoResponse};
use crate::AppState;

pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        message: "Blockhouse Kafka-ClickHouse Indexer".to_string(),
        topic: state.info.topic.clone(),
        broker: state.info.broker.clone(),
        clickhouse: state.info.clickhouse.clone(),
        table: state.info.table.clone(),
        protobuf_loaded: state.registry.is_ready(),
        message_types: state.registry.names().into_iter().map(String::from).collect(),
    })
}

/// Liveness: answering at all is enough.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness: the store must answer a count.
pub async fn readiness(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    match state.sink.count(RecordFilter::All).await {
        Ok(_) => Ok(Json(HealthResponse {
            status: "ready".to_string(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed: store unavailable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub async fn consumer_status(State(state): State<AppState>) -> Json<LoopStats> {
    Json(state.loop_status.snapshot().await)
}
