//! Record normalization
//!
//! Turns a message and its decode outcome into the fixed-shape record the
//! sink persists. Pure: no I/O, no clock access (the caller supplies `now`).

use chrono::{DateTime, SubsecRound, Utc};

use crate::cascade::DecodeOutcome;
use crate::record::{IngestRecord, RawMessage};

/// Build the record for `message` observed at `now`.
///
/// `now` is truncated to millisecond precision, the resolution of the
/// store's timestamp column.
pub fn normalize(message: &RawMessage, outcome: &DecodeOutcome, now: DateTime<Utc>) -> IngestRecord {
    IngestRecord::new(
        now.trunc_subsecs(3),
        message.stream.clone(),
        message.partition_id,
        message.sequence_offset.clone(),
        outcome.kind().to_string(),
        outcome.summary(),
        outcome.is_schema_decoded(),
        outcome.decode_succeeded(),
    )
}
