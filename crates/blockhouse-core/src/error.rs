//! Error Types for blockhouse-core
//!
//! Decoding never fails (see [`crate::cascade`]), so the only errors here come
//! from reading persisted records back out of the store.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A store timestamp that is not `YYYY-MM-DD HH:MM:SS[.fff]`.
    #[error("Invalid store timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },
}
