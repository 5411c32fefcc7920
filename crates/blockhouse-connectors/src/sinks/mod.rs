//! Ingestion sink implementations.

pub mod clickhouse;
pub mod memory;

pub use clickhouse::{ClickHouseSink, ClickHouseSinkConfig};
pub use memory::MemorySink;
