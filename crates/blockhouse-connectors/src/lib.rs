//! Blockhouse Connectors
//!
//! The I/O half of the ingest pipeline: where messages come from, where
//! records go, and the loop that moves one to the other.
//!
//! ## Architecture
//!
//! - **Traits**: `MessageSource` and `IngestSink` define the two seams.
//! - **Sources**: Kafka (consumer group, manual commits) and an in-memory log.
//! - **Sinks**: ClickHouse over HTTP and an in-memory store.
//! - **Pipeline**: `IngestPipeline` runs classify, normalize and append for
//!   one message, dropping records the sink rejects.
//! - **Runtime**: `IngestLoop` drives a source through its lifecycle and
//!   acknowledges each message after its append attempt.
//!
//! ## Feature Flags
//!
//! - `kafka` - Enables the rdkafka-backed consumer. Without it `KafkaSource`
//!   still parses its configuration but cannot connect.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod runtime;
pub mod sinks;
pub mod sources;
pub mod traits;

pub use config::LoopState;
pub use error::{ConnectorError, Result};
pub use pipeline::{IngestPipeline, Processed};
pub use runtime::{IngestLoop, LoopStats, LoopStatus};
pub use sinks::{ClickHouseSink, ClickHouseSinkConfig, MemorySink};
pub use sources::{KafkaSource, KafkaSourceConfig, MemoryLog, MemorySource};
pub use traits::{IngestSink, MessageSource, RecordFilter};
