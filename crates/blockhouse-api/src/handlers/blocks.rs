//! Stored record listing and clearing

use axum::{
    extract::{Query, State},
    Json,
};

use super::{store_failure, ApiError};
use crate::models::{BlocksQuery, BlocksResponse, MessageResponse};
use crate::AppState;

/// Most recent records first.
pub async fn list_blocks(
    State(state): State<AppState>,
    Query(params): Query<BlocksQuery>,
) -> Result<Json<BlocksResponse>, ApiError> {
    let blocks = state
        .sink
        .recent(params.effective_limit())
        .await
        .map_err(|e| store_failure("Error querying blocks", e))?;

    Ok(Json(BlocksResponse {
        count: blocks.len(),
        blocks,
    }))
}

/// Remove every stored record.
pub async fn clear_blocks(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    state
        .sink
        .truncate()
        .await
        .map_err(|e| store_failure("Error clearing blocks table", e))?;

    tracing::warn!(table = %state.info.table, "blocks table cleared via admin API");
    Ok(Json(MessageResponse {
        message: "Blocks table cleared successfully".to_string(),
    }))
}
