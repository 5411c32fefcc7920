//! Message and record types
//!
//! ## RawMessage
//! What the consumer loop hands to the cascade: provenance plus an optional
//! payload. The sequence offset is kept as decimal text so it never goes
//! through a lossy numeric conversion.
//!
//! ## IngestRecord
//! The persisted unit, one per consumed message. Serde field names match the
//! store's column names (`timestamp`, `topic`, `partition`, `offset`,
//! `message_type`, `decoded_data`, `is_protobuf`, `decode_success`), so a
//! record serializes directly into a `JSONEachRow` line.
//!
//! Records are built only by [`crate::normalize::normalize`], which upholds
//! `was_schema_decoded => decode_succeeded`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message read from the source log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Topic the message was read from.
    pub stream: String,
    /// Partition within the topic.
    pub partition_id: u32,
    /// Offset within the partition, as decimal text.
    pub sequence_offset: String,
    /// Message value; `None` for a null (tombstone) value.
    pub payload: Option<Bytes>,
}

impl RawMessage {
    pub fn new(
        stream: impl Into<String>,
        partition_id: u32,
        sequence_offset: impl Into<String>,
        payload: Option<Bytes>,
    ) -> Self {
        Self {
            stream: stream.into(),
            partition_id,
            sequence_offset: sequence_offset.into(),
            payload,
        }
    }

    /// Payload length in bytes, zero when absent.
    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }

    /// Lowercase, space-separated hex dump of the payload for debug logs.
    pub fn hex_dump(&self) -> String {
        match &self.payload {
            Some(payload) => payload
                .iter()
                .map(|b| hex::encode([*b]))
                .collect::<Vec<_>>()
                .join(" "),
            None => String::new(),
        }
    }
}

/// One normalized, persistable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    #[serde(rename = "timestamp", with = "crate::timestamp::store_format")]
    observed_at: DateTime<Utc>,

    #[serde(rename = "topic")]
    stream: String,

    #[serde(rename = "partition")]
    partition_id: u32,

    #[serde(rename = "offset")]
    sequence_offset: String,

    #[serde(rename = "message_type")]
    outcome_kind: String,

    #[serde(rename = "decoded_data")]
    payload_summary: String,

    #[serde(rename = "is_protobuf")]
    was_schema_decoded: bool,

    #[serde(rename = "decode_success")]
    decode_succeeded: bool,
}

impl IngestRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        observed_at: DateTime<Utc>,
        stream: String,
        partition_id: u32,
        sequence_offset: String,
        outcome_kind: String,
        payload_summary: String,
        was_schema_decoded: bool,
        decode_succeeded: bool,
    ) -> Self {
        debug_assert!(!was_schema_decoded || decode_succeeded);
        Self {
            observed_at,
            stream,
            partition_id,
            sequence_offset,
            outcome_kind,
            payload_summary,
            was_schema_decoded,
            decode_succeeded,
        }
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn sequence_offset(&self) -> &str {
        &self.sequence_offset
    }

    pub fn outcome_kind(&self) -> &str {
        &self.outcome_kind
    }

    pub fn payload_summary(&self) -> &str {
        &self.payload_summary
    }

    pub fn was_schema_decoded(&self) -> bool {
        self.was_schema_decoded
    }

    pub fn decode_succeeded(&self) -> bool {
        self.decode_succeeded
    }

    /// Serialize as a single `JSONEachRow` line (no trailing newline).
    pub fn to_json_row(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
