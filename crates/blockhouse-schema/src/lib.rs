//! Blockhouse Schema Registry
//!
//! Loads binary message schemas (protobuf) once at startup and exposes them as
//! an ordered list of decode candidates.
//!
//! # Ordering is a heuristic
//!
//! Payloads on the wire carry no type tag, and protobuf is not
//! self-describing: bytes written for one message type frequently parse as a
//! "valid" instance of another. The registry order therefore encodes a prior
//! belief about which type is most likely, and the cascade accepts the first
//! candidate that parses. An outcome named after a candidate means "this was
//! the first type that accepted the bytes", not "this is the type the
//! producer wrote".
//!
//! # Usage
//!
//! ```ignore
//! use blockhouse_schema::{SchemaRegistry, SchemaSource};
//!
//! let source = SchemaSource::new("proto/confirmed_block.proto");
//! let registry = SchemaRegistry::load_or_empty(&source);
//!
//! for candidate in registry.candidates() {
//!     if let Ok(value) = candidate.decode(payload) {
//!         println!("{} => {}", candidate.name(), value);
//!         break;
//!     }
//! }
//! ```

pub mod candidate;
pub mod error;
pub mod registry;
pub mod source;

pub use candidate::{ProtobufCandidate, SchemaCandidate};
pub use error::{DecodeError, Result, SchemaLoadError};
pub use registry::SchemaRegistry;
pub use source::{SchemaSource, DEFAULT_MESSAGE_TYPES};
