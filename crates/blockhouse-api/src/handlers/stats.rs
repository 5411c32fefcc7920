//! Aggregate counts

use axum::{extract::State, Json};
use blockhouse_connectors::RecordFilter;

use super::{store_failure, ApiError};
use crate::models::{Stats, StatsResponse};
use crate::AppState;

const STATS_ERROR: &str = "Error getting database statistics";

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let sink = &state.sink;

    let total_blocks = sink
        .count(RecordFilter::All)
        .await
        .map_err(|e| store_failure(STATS_ERROR, e))?;
    let protobuf_decoded = sink
        .count(RecordFilter::SchemaDecoded)
        .await
        .map_err(|e| store_failure(STATS_ERROR, e))?;
    let decode_success = sink
        .count(RecordFilter::DecodeSucceeded)
        .await
        .map_err(|e| store_failure(STATS_ERROR, e))?;

    Ok(Json(StatsResponse {
        stats: Stats {
            total_blocks,
            protobuf_decoded,
            decode_success,
        },
    }))
}
