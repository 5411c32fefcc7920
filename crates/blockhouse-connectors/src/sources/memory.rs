//! In-process partitioned log.
//!
//! `MemoryLog` is a cloneable handle to a set of topics, each an array of
//! append-only partitions, plus the committed offsets of every consumer
//! group. `MemorySource` reads from it with the same delivery contract as a
//! Kafka consumer group:
//!
//! - a fresh subscription resumes at the group's committed offset per
//!   partition, or at the tail when the group has never committed;
//! - `acknowledge` commits `offset + 1`;
//! - messages read but never acknowledged are redelivered to the next
//!   subscription of the same group.
//!
//! Stands in for Kafka in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use blockhouse_core::RawMessage;
use bytes::Bytes;

use crate::error::{ConnectorError, Result};
use crate::traits::MessageSource;

#[derive(Debug, Default)]
struct LogInner {
    topics: HashMap<String, Vec<Vec<Option<Bytes>>>>,
    /// (group, topic, partition) -> next offset to read.
    committed: HashMap<(String, String, u32), u64>,
    unavailable: bool,
}

/// Shared handle to an in-memory log.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    inner: Arc<Mutex<LogInner>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create `topic` with `partitions` empty partitions. Existing topics
    /// are only ever grown.
    pub fn create_topic(&self, topic: &str, partitions: u32) {
        let mut inner = self.lock();
        let parts = inner.topics.entry(topic.to_string()).or_default();
        while parts.len() < partitions as usize {
            parts.push(Vec::new());
        }
    }

    /// Append a message and return its offset.
    pub fn produce(&self, topic: &str, partition: u32, payload: Option<Bytes>) -> Result<u64> {
        let mut inner = self.lock();
        let parts = inner.topics.get_mut(topic).ok_or_else(|| {
            ConnectorError::SourceError(format!("unknown topic '{}'", topic))
        })?;
        let part = parts.get_mut(partition as usize).ok_or_else(|| {
            ConnectorError::SourceError(format!(
                "topic '{}' has no partition {}",
                topic, partition
            ))
        })?;
        part.push(payload);
        Ok(part.len() as u64 - 1)
    }

    /// Offset one past the last message of each partition.
    pub fn end_offsets(&self, topic: &str) -> Vec<u64> {
        self.lock()
            .topics
            .get(topic)
            .map(|parts| parts.iter().map(|p| p.len() as u64).collect())
            .unwrap_or_default()
    }

    /// Committed position of `group` on a partition.
    pub fn committed(&self, group: &str, topic: &str, partition: u32) -> Option<u64> {
        self.lock()
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Simulate the broker going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    fn is_available(&self) -> bool {
        !self.lock().unavailable
    }

    fn read(&self, topic: &str, partition: u32, offset: u64) -> Option<Option<Bytes>> {
        self.lock()
            .topics
            .get(topic)
            .and_then(|parts| parts.get(partition as usize))
            .and_then(|part| part.get(offset as usize))
            .cloned()
    }

    fn commit(&self, group: &str, topic: &str, partition: u32, next: u64) {
        let mut inner = self.lock();
        let entry = inner
            .committed
            .entry((group.to_string(), topic.to_string(), partition))
            .or_insert(0);
        // Commits never move backwards.
        *entry = (*entry).max(next);
    }
}

/// Consumer-group reader over a [`MemoryLog`].
pub struct MemorySource {
    name: String,
    log: MemoryLog,
    group_id: String,
    connected: bool,
    topic: Option<String>,
    /// Next offset to read, per partition.
    positions: Vec<u64>,
    /// Partition to try first on the next poll.
    cursor: usize,
}

impl MemorySource {
    pub fn new(name: &str, log: MemoryLog, group_id: &str) -> Self {
        Self {
            name: name.to_string(),
            log,
            group_id: group_id.to_string(),
            connected: false,
            topic: None,
            positions: Vec::new(),
            cursor: 0,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected {
            return Err(ConnectorError::SourceError(
                "source is not connected".to_string(),
            ));
        }
        if !self.log.is_available() {
            return Err(ConnectorError::SourceConnectionError(
                "log became unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn connect(&mut self) -> Result<()> {
        if !self.log.is_available() {
            return Err(ConnectorError::SourceConnectionError(
                "in-memory log is unavailable".to_string(),
            ));
        }
        self.connected = true;
        tracing::info!(source = %self.name, group_id = %self.group_id, "memory source connected");
        Ok(())
    }

    async fn subscribe(&mut self, stream: &str) -> Result<()> {
        self.ensure_connected()?;

        let ends = self.log.end_offsets(stream);
        if ends.is_empty() {
            return Err(ConnectorError::SourceConnectionError(format!(
                "topic '{}' does not exist",
                stream
            )));
        }

        self.positions = ends
            .iter()
            .enumerate()
            .map(|(p, end)| {
                self.log
                    .committed(&self.group_id, stream, p as u32)
                    .unwrap_or(*end)
            })
            .collect();
        self.topic = Some(stream.to_string());
        self.cursor = 0;

        tracing::info!(source = %self.name, topic = %stream, positions = ?self.positions, "memory source subscribed");
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<RawMessage>> {
        self.ensure_connected()?;
        let topic = self
            .topic
            .clone()
            .ok_or_else(|| ConnectorError::SourceError("not subscribed".to_string()))?;

        let partitions = self.positions.len();
        for step in 0..partitions {
            let p = (self.cursor + step) % partitions;
            let offset = self.positions[p];
            if let Some(payload) = self.log.read(&topic, p as u32, offset) {
                self.positions[p] = offset + 1;
                self.cursor = (p + 1) % partitions;
                return Ok(Some(RawMessage::new(
                    topic,
                    p as u32,
                    offset.to_string(),
                    payload,
                )));
            }
        }

        Ok(None)
    }

    async fn acknowledge(&mut self, message: &RawMessage) -> Result<()> {
        self.ensure_connected()?;
        let offset: u64 = message.sequence_offset.parse().map_err(|e| {
            ConnectorError::SourceError(format!(
                "invalid offset '{}': {}",
                message.sequence_offset, e
            ))
        })?;
        self.log
            .commit(&self.group_id, &message.stream, message.partition_id, offset + 1);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.topic = None;
        self.positions.clear();
        tracing::info!(source = %self.name, "memory source disconnected");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
