//! Blockhouse core
//!
//! The pure half of the ingest pipeline:
//!
//! ```text
//! RawMessage ──classify──▶ DecodeOutcome ──normalize──▶ IngestRecord
//!                 ▲
//!          SchemaRegistry
//! ```
//!
//! Nothing in this crate performs I/O. The consumer loop and sinks live in
//! `blockhouse-connectors`.

pub mod cascade;
pub mod error;
pub mod normalize;
pub mod record;
pub mod timestamp;

pub use cascade::{classify, DecodeOutcome, RawCapture};
pub use error::{Error, Result};
pub use normalize::normalize;
pub use record::{IngestRecord, RawMessage};
pub use timestamp::{format_store_timestamp, parse_store_timestamp, to_store_timestamp};
