//! Stream consumer loop.
//!
//! `IngestLoop` owns one [`MessageSource`] and drives it through
//!
//! ```text
//! Disconnected -> Connected -> Subscribed -> Running -> Draining -> Disconnected
//! ```
//!
//! While running it handles one message at a time: classify, normalize,
//! append, then acknowledge. The acknowledgment waits for the append attempt
//! to finish whether or not it succeeded, so delivery is at-least-once. A
//! crash after the append and before the acknowledgment redelivers the
//! message to the next subscriber of the group.
//!
//! Shutdown is only observed while waiting for the next message. A message
//! already taken from the source always runs to completion; one not yet
//! taken stays in the log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use blockhouse_core::RawMessage;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::config::LoopState;
use crate::error::{ConnectorError, Result};
use crate::pipeline::{IngestPipeline, Processed};
use crate::traits::MessageSource;

/// Pause between polls that returned nothing.
const IDLE_BACKOFF: Duration = Duration::from_millis(100);
/// Pause after a non-fatal source error.
const ERROR_BACKOFF: Duration = Duration::from_millis(1000);

/// Point-in-time view of the loop, served by the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub state: LoopState,
    pub topic: String,
    /// Messages taken from the source and run through the pipeline.
    pub processed: u64,
    /// Records the sink accepted.
    pub appended: u64,
    /// Records dropped because the sink rejected them.
    pub append_failures: u64,
    /// Acknowledgments the source rejected.
    pub ack_failures: u64,
    /// Last fatal error, if the loop stopped on one.
    pub last_error: Option<String>,
}

/// Shared, live status of an [`IngestLoop`].
#[derive(Debug)]
pub struct LoopStatus {
    topic: String,
    state: RwLock<LoopState>,
    last_error: RwLock<Option<String>>,
    processed: AtomicU64,
    appended: AtomicU64,
    append_failures: AtomicU64,
    ack_failures: AtomicU64,
}

impl LoopStatus {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            state: RwLock::new(LoopState::Disconnected),
            last_error: RwLock::new(None),
            processed: AtomicU64::new(0),
            appended: AtomicU64::new(0),
            append_failures: AtomicU64::new(0),
            ack_failures: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> LoopState {
        *self.state.read().await
    }

    pub async fn snapshot(&self) -> LoopStats {
        LoopStats {
            state: *self.state.read().await,
            topic: self.topic.clone(),
            processed: self.processed.load(Ordering::Relaxed),
            appended: self.appended.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            last_error: self.last_error.read().await.clone(),
        }
    }

    async fn transition(&self, next: LoopState) {
        let mut state = self.state.write().await;
        if *state != next {
            tracing::info!(topic = %self.topic, from = %*state, to = %next, "consumer loop state change");
            *state = next;
        }
    }

    async fn fail(&self, error: &ConnectorError) {
        *self.last_error.write().await = Some(error.to_string());
    }

    fn record(&self, processed: &Processed) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if processed.appended {
            self.appended.fetch_add(1, Ordering::Relaxed);
        } else {
            self.append_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// The single consumer loop of a process.
pub struct IngestLoop {
    source: Box<dyn MessageSource>,
    pipeline: IngestPipeline,
    topic: String,
    status: Arc<LoopStatus>,
}

impl IngestLoop {
    pub fn new(source: Box<dyn MessageSource>, pipeline: IngestPipeline, topic: &str) -> Self {
        Self {
            source,
            pipeline,
            topic: topic.to_string(),
            status: Arc::new(LoopStatus::new(topic)),
        }
    }

    /// Handle for observing the loop from other tasks.
    pub fn status(&self) -> Arc<LoopStatus> {
        self.status.clone()
    }

    /// Connect and subscribe. On failure the source is released and the
    /// loop is back in `Disconnected`.
    pub async fn start(&mut self) -> Result<()> {
        if let Err(e) = self.source.connect().await {
            return Err(self.abort(e).await);
        }
        self.status.transition(LoopState::Connected).await;

        if let Err(e) = self.source.subscribe(&self.topic).await {
            return Err(self.abort(e).await);
        }
        self.status.transition(LoopState::Subscribed).await;

        tracing::info!(source = %self.source.name(), topic = %self.topic, "consumer loop subscribed");
        Ok(())
    }

    /// Take at most one message and run it through the pipeline.
    ///
    /// Returns `Ok(false)` when no message was available.
    pub async fn poll_once(&mut self) -> Result<bool> {
        match self.source.next_message().await? {
            Some(message) => {
                self.handle(message).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped), then
    /// drain and disconnect.
    ///
    /// Returns an error only for faults that end the loop, chiefly
    /// `SourceConnectionError`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let stopping = *shutdown.borrow();
        if !stopping {
            if self.status.state().await == LoopState::Disconnected {
                self.start().await?;
            }
            self.status.transition(LoopState::Running).await;
            self.consume(&mut shutdown).await?;
        }

        self.status.transition(LoopState::Draining).await;
        tracing::info!(topic = %self.topic, "draining consumer loop");
        if let Err(e) = self.source.disconnect().await {
            tracing::warn!(topic = %self.topic, error = %e, "error disconnecting source");
        }
        self.status.transition(LoopState::Disconnected).await;
        Ok(())
    }

    async fn consume(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let polled = tokio::select! {
                biased;
                _ = shutdown.changed() => None,
                polled = self.source.next_message() => Some(polled),
            };

            let Some(polled) = polled else {
                break;
            };

            match polled {
                Ok(Some(message)) => self.handle(message).await,
                Ok(None) => tokio::time::sleep(IDLE_BACKOFF).await,
                Err(e) if e.is_fatal_to_loop() => {
                    tracing::error!(topic = %self.topic, error = %e, "consumer loop stopped");
                    return Err(self.abort(e).await);
                }
                Err(e) => {
                    tracing::error!(topic = %self.topic, error = %e, "error polling source");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }

        Ok(())
    }

    async fn handle(&mut self, message: RawMessage) {
        let processed = self.pipeline.process(&message).await;
        self.status.record(&processed);

        if let Err(e) = self.source.acknowledge(&message).await {
            self.status.ack_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                topic = %message.stream,
                partition = message.partition_id,
                offset = %message.sequence_offset,
                error = %e,
                "failed to acknowledge message"
            );
        }
    }

    async fn abort(&mut self, error: ConnectorError) -> ConnectorError {
        self.status.fail(&error).await;
        if let Err(e) = self.source.disconnect().await {
            tracing::warn!(topic = %self.topic, error = %e, "error disconnecting source");
        }
        self.status.transition(LoopState::Disconnected).await;
        error
    }
}
