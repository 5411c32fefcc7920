//! Per-message pipeline: classify, normalize, append.

use std::sync::Arc;

use blockhouse_core::{classify, normalize, IngestRecord, RawMessage};
use blockhouse_schema::SchemaRegistry;
use chrono::{DateTime, Utc};

use crate::traits::IngestSink;

/// What happened to one message.
#[derive(Debug, Clone)]
pub struct Processed {
    pub record: IngestRecord,
    /// `false` when the sink rejected the record and it was dropped.
    pub appended: bool,
}

/// Read-only registry plus a shared sink. Cheap to clone.
#[derive(Clone)]
pub struct IngestPipeline {
    registry: Arc<SchemaRegistry>,
    sink: Arc<dyn IngestSink>,
}

impl IngestPipeline {
    pub fn new(registry: Arc<SchemaRegistry>, sink: Arc<dyn IngestSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &Arc<dyn IngestSink> {
        &self.sink
    }

    /// Process `message`, stamping the record with the current time.
    pub async fn process(&self, message: &RawMessage) -> Processed {
        self.process_at(message, Utc::now()).await
    }

    /// Process `message` as if observed at `now`.
    ///
    /// Never fails: a sink error is logged and the record dropped. There is
    /// no retry and no dead-letter queue.
    pub async fn process_at(&self, message: &RawMessage, now: DateTime<Utc>) -> Processed {
        tracing::debug!(
            topic = %message.stream,
            partition = message.partition_id,
            offset = %message.sequence_offset,
            len = message.payload_len(),
            hex = %message.hex_dump(),
            "received message"
        );

        let outcome = classify(message.payload.as_deref(), &self.registry);
        let record = normalize(message, &outcome, now);

        tracing::debug!(
            offset = %message.sequence_offset,
            message_type = %record.outcome_kind(),
            is_protobuf = record.was_schema_decoded(),
            decode_success = record.decode_succeeded(),
            "message classified"
        );

        let appended = match self.sink.append(&record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    sink = %self.sink.name(),
                    topic = %record.stream(),
                    partition = record.partition_id(),
                    offset = %record.sequence_offset(),
                    error = %e,
                    "failed to append record, dropping it"
                );
                false
            }
        };

        Processed { record, appended }
    }
}

impl std::fmt::Debug for IngestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPipeline")
            .field("registry", &self.registry)
            .field("sink", &self.sink.name())
            .finish()
    }
}
