//! API handlers

pub mod blocks;
pub mod service;
pub mod stats;

use axum::{http::StatusCode, Json};
use blockhouse_connectors::ConnectorError;

use crate::models::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Log a store failure and turn it into a 500 with a JSON body.
pub(crate) fn store_failure(what: &str, e: ConnectorError) -> ApiError {
    tracing::error!(error = %e, "{}", what);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: what.to_string(),
            message: e.to_string(),
        }),
    )
}
