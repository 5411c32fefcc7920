//! In-memory sink.
//!
//! Keeps records in insertion order behind a `tokio::sync::RwLock`. Failure
//! can be switched on to exercise the store-error paths of the loop and the
//! admin surface.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use blockhouse_core::IngestRecord;
use tokio::sync::RwLock;

use crate::error::{ConnectorError, Result};
use crate::traits::{IngestSink, RecordFilter};

#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<Vec<IngestRecord>>,
    schema_ready: AtomicBool,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `StoreError`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn schema_ready(&self) -> bool {
        self.schema_ready.load(Ordering::SeqCst)
    }

    /// Snapshot of every stored record, oldest first.
    pub async fn records(&self) -> Vec<IngestRecord> {
        self.records.read().await.clone()
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ConnectorError::StoreError(format!(
                "memory sink is failing ({})",
                op
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IngestSink for MemorySink {
    async fn ensure_schema(&self) -> Result<()> {
        self.check("ensure_schema")?;
        self.schema_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn append(&self, record: &IngestRecord) -> Result<()> {
        self.check("append")?;
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn truncate(&self) -> Result<()> {
        self.check("truncate")?;
        self.records.write().await.clear();
        Ok(())
    }

    async fn count(&self, filter: RecordFilter) -> Result<u64> {
        self.check("count")?;
        let records = self.records.read().await;
        let n = match filter {
            RecordFilter::All => records.len(),
            RecordFilter::SchemaDecoded => records.iter().filter(|r| r.was_schema_decoded()).count(),
            RecordFilter::DecodeSucceeded => records.iter().filter(|r| r.decode_succeeded()).count(),
        };
        Ok(n as u64)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<IngestRecord>> {
        self.check("recent")?;
        let records = self.records.read().await;
        let mut newest_first: Vec<IngestRecord> = records.iter().rev().cloned().collect();
        // Stable, so equal timestamps keep newest-insert-first.
        newest_first.sort_by(|a, b| b.observed_at().cmp(&a.observed_at()));
        newest_first.truncate(limit);
        Ok(newest_first)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
