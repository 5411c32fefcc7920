//! Integration tests for the admin API
//!
//! Builds the real router over an in-memory sink and sends requests via
//! tower::ServiceExt.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use blockhouse_api::models::{BlocksResponse, ErrorResponse, InfoResponse, StatsResponse};
use blockhouse_api::{create_router, AppState, ServiceInfo};
use blockhouse_connectors::{
    IngestLoop, IngestPipeline, IngestSink, LoopStatus, MemoryLog, MemorySink, MemorySource,
};
use blockhouse_core::RawMessage;
use blockhouse_schema::{SchemaRegistry, SchemaSource};
use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

const TOPIC: &str = "grpc1";

fn service_info() -> Arc<ServiceInfo> {
    Arc::new(ServiceInfo {
        topic: TOPIC.to_string(),
        broker: "localhost:9092".to_string(),
        clickhouse: "http://localhost:8123".to_string(),
        table: "blocks".to_string(),
    })
}

fn app_with(sink: Arc<MemorySink>, registry: SchemaRegistry, status: Arc<LoopStatus>) -> axum::Router {
    create_router(AppState {
        sink: sink as Arc<dyn IngestSink>,
        registry: Arc::new(registry),
        loop_status: status,
        info: service_info(),
    })
}

fn test_app(sink: Arc<MemorySink>) -> axum::Router {
    app_with(sink, SchemaRegistry::empty(), Arc::new(LoopStatus::new(TOPIC)))
}

/// Run `payloads` through the pipeline one second apart, oldest first.
async fn ingest(sink: &Arc<MemorySink>, payloads: &[&[u8]]) {
    let offsets: Vec<String> = (0..payloads.len()).map(|i| i.to_string()).collect();
    let messages: Vec<(&str, &[u8])> = offsets
        .iter()
        .map(String::as_str)
        .zip(payloads.iter().copied())
        .collect();
    ingest_at_offsets(sink, &messages).await;
}

/// Like [`ingest`], with explicit offsets.
async fn ingest_at_offsets(sink: &Arc<MemorySink>, messages: &[(&str, &[u8])]) {
    let pipeline = IngestPipeline::new(Arc::new(SchemaRegistry::empty()), sink.clone());
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    for (i, (offset, payload)) in messages.iter().enumerate() {
        let message = RawMessage::new(TOPIC, 0, *offset, Some(Bytes::copy_from_slice(payload)));
        let processed = pipeline
            .process_at(&message, start + Duration::seconds(i as i64))
            .await;
        assert!(processed.appended);
    }
}

async fn send(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let resp = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, "GET", uri).await
}

// ---------------------------------------------------------------
// Health endpoints
// ---------------------------------------------------------------

#[tokio::test]
async fn test_health_check() {
    let (status, body) = get(test_app(Arc::new(MemorySink::new())), "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_health_stays_ok_when_store_fails() {
    let sink = Arc::new(MemorySink::new());
    sink.set_failing(true);

    let (status, _) = get(test_app(sink), "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_follows_store() {
    let sink = Arc::new(MemorySink::new());

    let (status, body) = get(test_app(sink.clone()), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ready");

    sink.set_failing(true);
    let (status, _) = get(test_app(sink), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ---------------------------------------------------------------
// Service info
// ---------------------------------------------------------------

#[tokio::test]
async fn test_info_without_schemas() {
    let (status, body) = get(test_app(Arc::new(MemorySink::new())), "/").await;

    assert_eq!(status, StatusCode::OK);
    let info: InfoResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(info.topic, TOPIC);
    assert_eq!(info.broker, "localhost:9092");
    assert_eq!(info.table, "blocks");
    assert!(!info.protobuf_loaded);
    assert!(info.message_types.is_empty());
}

#[tokio::test]
async fn test_info_lists_loaded_message_types() {
    let proto = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../proto/confirmed_block.proto");
    let registry = SchemaRegistry::load(&SchemaSource::new(proto)).unwrap();
    let app = app_with(
        Arc::new(MemorySink::new()),
        registry,
        Arc::new(LoopStatus::new(TOPIC)),
    );

    let (status, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["protobufLoaded"], true);
    assert_eq!(json["messageTypes"][0], "ConfirmedBlock");
    assert_eq!(json["messageTypes"].as_array().unwrap().len(), 3);
}

// ---------------------------------------------------------------
// Stats
// ---------------------------------------------------------------

#[tokio::test]
async fn test_stats_empty_table() {
    let (status, body) = get(test_app(Arc::new(MemorySink::new())), "/stats").await;

    assert_eq!(status, StatusCode::OK);
    let stats: StatsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.stats.total_blocks, 0);
    assert_eq!(stats.stats.protobuf_decoded, 0);
    assert_eq!(stats.stats.decode_success, 0);
}

#[tokio::test]
async fn test_stats_counts_outcomes() {
    let sink = Arc::new(MemorySink::new());
    ingest(&sink, &[br#"{"slot":1}"#, &[0xff, 0x00, 0x13], br#"{"slot":2}"#]).await;

    let (status, body) = get(test_app(sink), "/stats").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["stats"]["total_blocks"], 3);
    assert_eq!(json["stats"]["protobuf_decoded"], 0);
    assert_eq!(json["stats"]["decode_success"], 2);
}

#[tokio::test]
async fn test_stats_store_failure_is_500() {
    let sink = Arc::new(MemorySink::new());
    sink.set_failing(true);

    let (status, body) = get(test_app(sink), "/stats").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Error getting database statistics");
    assert!(!error.message.is_empty());
}

// ---------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------

#[tokio::test]
async fn test_list_blocks_newest_first() {
    let sink = Arc::new(MemorySink::new());
    ingest(&sink, &[br#"{"n":0}"#, br#"{"n":1}"#, br#"{"n":2}"#]).await;

    let (status, body) = get(test_app(sink), "/blocks?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["count"], 2);
    let blocks = json["blocks"].as_array().unwrap();
    assert_eq!(blocks[0]["offset"], "2");
    assert_eq!(blocks[1]["offset"], "1");
    assert_eq!(blocks[0]["topic"], TOPIC);
    assert_eq!(blocks[0]["message_type"], "JSON");
    assert_eq!(blocks[0]["timestamp"], "2024-06-01 12:00:02.000");
}

#[tokio::test]
async fn test_list_blocks_orders_by_time_not_offset_text() {
    let sink = Arc::new(MemorySink::new());
    let empty: &[u8] = b"{}";
    ingest_at_offsets(&sink, &[("10", empty), ("2", empty), ("100", empty)]).await;

    let (status, body) = get(test_app(sink), "/blocks").await;

    assert_eq!(status, StatusCode::OK);
    let blocks: BlocksResponse = serde_json::from_slice(&body).unwrap();
    let offsets: Vec<&str> = blocks.blocks.iter().map(|b| b.sequence_offset()).collect();
    assert_eq!(offsets, vec!["100", "2", "10"]);
}

#[tokio::test]
async fn test_list_blocks_default_and_capped_limit() {
    let sink = Arc::new(MemorySink::new());
    let payloads: Vec<Vec<u8>> = (0..12).map(|i| format!("{{\"n\":{}}}", i).into_bytes()).collect();
    let refs: Vec<&[u8]> = payloads.iter().map(|p| p.as_slice()).collect();
    ingest(&sink, &refs).await;

    for uri in ["/blocks", "/blocks?limit=0", "/blocks?limit=-4", "/blocks?limit=many"] {
        let (status, body) = get(test_app(sink.clone()), uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        let blocks: BlocksResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(blocks.count, 10, "{}", uri);
    }

    let (_, body) = get(test_app(sink), "/blocks?limit=100000").await;
    let blocks: BlocksResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(blocks.count, 12);
    assert_eq!(blocks.blocks[0].sequence_offset(), "11");
}

#[tokio::test]
async fn test_list_blocks_store_failure_is_500() {
    let sink = Arc::new(MemorySink::new());
    sink.set_failing(true);

    let (status, body) = get(test_app(sink), "/blocks").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Error querying blocks");
}

#[tokio::test]
async fn test_clear_blocks() {
    let sink = Arc::new(MemorySink::new());
    ingest(&sink, &[br#"{"n":0}"#, b"raw"]).await;

    let (status, body) = send(test_app(sink.clone()), "DELETE", "/blocks").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "Blocks table cleared successfully");

    let (_, body) = get(test_app(sink), "/stats").await;
    let stats: StatsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.stats.total_blocks, 0);
}

#[tokio::test]
async fn test_clear_blocks_store_failure_is_500() {
    let sink = Arc::new(MemorySink::new());
    sink.set_failing(true);

    let (status, body) = send(test_app(sink), "DELETE", "/blocks").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Error clearing blocks table");
}

// ---------------------------------------------------------------
// Consumer loop status
// ---------------------------------------------------------------

#[tokio::test]
async fn test_consumer_status_before_start() {
    let (status, body) = get(test_app(Arc::new(MemorySink::new())), "/consumer").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["state"], "disconnected");
    assert_eq!(json["topic"], TOPIC);
    assert_eq!(json["processed"], 0);
    assert!(json["last_error"].is_null());
}

#[tokio::test]
async fn test_consumer_status_tracks_loop() {
    let log = MemoryLog::new();
    log.create_topic(TOPIC, 1);
    let sink = Arc::new(MemorySink::new());
    let pipeline = IngestPipeline::new(Arc::new(SchemaRegistry::empty()), sink.clone());
    let source = MemorySource::new("memory", log.clone(), "blockhouse-indexer");
    let mut ingest = IngestLoop::new(Box::new(source), pipeline, TOPIC);
    let app = app_with(sink, SchemaRegistry::empty(), ingest.status());

    ingest.start().await.unwrap();
    log.produce(TOPIC, 0, Some(Bytes::from_static(br#"{"slot":7}"#)))
        .unwrap();
    log.produce(TOPIC, 0, None).unwrap();
    assert!(ingest.poll_once().await.unwrap());
    assert!(ingest.poll_once().await.unwrap());
    assert!(!ingest.poll_once().await.unwrap());

    let (status, body) = get(app.clone(), "/consumer").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["state"], "subscribed");
    assert_eq!(json["processed"], 2);
    assert_eq!(json["appended"], 2);
    assert_eq!(json["append_failures"], 0);

    let (_, body) = get(app, "/stats").await;
    let stats: StatsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.stats.total_blocks, 2);
    assert_eq!(stats.stats.decode_success, 1);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (status, _) = get(test_app(Arc::new(MemorySink::new())), "/topics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
