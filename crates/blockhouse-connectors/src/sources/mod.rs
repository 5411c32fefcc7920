//! Message source implementations.

pub mod kafka;
pub mod memory;

pub use kafka::{KafkaSource, KafkaSourceConfig};
pub use memory::{MemoryLog, MemorySource};
