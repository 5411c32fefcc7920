//! Connector traits.
//!
//! `MessageSource` is the consuming side (the partitioned log) and
//! `IngestSink` the persisting side (the analytical store). The consumer
//! loop owns exactly one of each.

use async_trait::async_trait;
use blockhouse_core::{IngestRecord, RawMessage};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which records an aggregate count covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFilter {
    /// Every stored record.
    All,
    /// Records whose payload was parsed by a schema candidate.
    SchemaDecoded,
    /// Records whose payload was understood (schema or structured text).
    DecodeSucceeded,
}

/// A partitioned log that messages are read from.
///
/// The loop calls `connect`, then `subscribe` once, then alternates
/// `next_message` and `acknowledge` until shutdown, then `disconnect`.
#[async_trait]
pub trait MessageSource: Send {
    /// Establish a connection to the log.
    ///
    /// Fails with `SourceConnectionError` when the log is unreachable.
    async fn connect(&mut self) -> Result<()>;

    /// Subscribe to a single stream, starting from the committed position
    /// of the consumer group or, lacking one, from the current tail.
    async fn subscribe(&mut self, stream: &str) -> Result<()>;

    /// Wait briefly for the next message.
    ///
    /// Returns `Ok(None)` when nothing arrived within the poll interval.
    /// Dropping the returned future before it completes must not lose a
    /// message: it stays available for this or a later subscription.
    async fn next_message(&mut self) -> Result<Option<RawMessage>>;

    /// Mark `message` as processed so it is not delivered again to the
    /// consumer group.
    async fn acknowledge(&mut self, message: &RawMessage) -> Result<()>;

    /// Release the connection. Unacknowledged messages are redelivered to
    /// the next subscriber of the group.
    async fn disconnect(&mut self) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// The store that normalized records are appended to.
///
/// Sinks are shared between the consumer loop and the admin surface, so all
/// operations take `&self`.
#[async_trait]
pub trait IngestSink: Send + Sync {
    /// Create the backing table if it does not exist. Idempotent.
    async fn ensure_schema(&self) -> Result<()>;

    /// Durably append one record.
    async fn append(&self, record: &IngestRecord) -> Result<()>;

    /// Remove every stored record.
    async fn truncate(&self) -> Result<()>;

    /// Count stored records matching `filter`.
    async fn count(&self, filter: RecordFilter) -> Result<u64>;

    /// The `limit` most recently observed records, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<IngestRecord>>;

    /// Release any held resources. The default does nothing.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}
