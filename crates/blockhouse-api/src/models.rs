//! API request and response models

use blockhouse_core::IngestRecord;
use serde::{Deserialize, Serialize};

/// Largest accepted `/blocks` limit.
pub const MAX_BLOCKS_LIMIT: usize = 1000;
/// `/blocks` limit when none (or an unusable one) is given.
pub const DEFAULT_BLOCKS_LIMIT: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub message: String,
    pub topic: String,
    pub broker: String,
    pub clickhouse: String,
    pub table: String,
    #[serde(rename = "protobufLoaded")]
    pub protobuf_loaded: bool,
    #[serde(rename = "messageTypes")]
    pub message_types: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stats {
    pub total_blocks: u64,
    pub protobuf_decoded: u64,
    pub decode_success: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: Stats,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlocksQuery {
    /// Kept as text so a malformed value falls back to the default instead
    /// of rejecting the request.
    pub limit: Option<String>,
}

impl BlocksQuery {
    /// Positive integers are capped at [`MAX_BLOCKS_LIMIT`]; anything else
    /// yields [`DEFAULT_BLOCKS_LIMIT`].
    pub fn effective_limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| (n as u64).min(MAX_BLOCKS_LIMIT as u64) as usize)
            .unwrap_or(DEFAULT_BLOCKS_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlocksResponse {
    pub blocks: Vec<IngestRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
