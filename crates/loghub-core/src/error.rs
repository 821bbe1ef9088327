//! Error types for loghub operations.
//!
//! ## Error Categories
//!
//! ### Configuration Errors
//! - `Config`: a required key is missing or a value failed to parse. Raised
//!   eagerly at construction, never retried.
//!
//! ### Remote Errors
//! - `Transient`: a non-fatal failure talking to the log store. The retry
//!   wrapper retries these up to the configured attempt limit with a fixed
//!   delay; once exhausted, the last failure is re-raised unchanged.
//!
//! ### Cancellation
//! - `Interrupted`: the reader was closed (or its worker cancelled) while an
//!   operation was in flight. Aborts any retry loop immediately and is
//!   surfaced distinctly from transient exhaustion.
//!
//! ### Data Integrity
//! - `Integrity`: the service or the computation violated an ordering
//!   guarantee (out-of-order histogram buckets, an ending position behind
//!   its starting position). Always fatal, never retried.
//!
//! ### Contract Violations
//! - `Contract`: a caller or placement contract was broken (retry wrapper
//!   invoked off the dispatch worker, missing per-cycle budget). Indicates a
//!   programming error, not a data or service condition.
//!
//! Only `Transient` is ever retried; everything else propagates to the
//! caller immediately. An incomplete histogram reply is not an error at all,
//! it is logged and tolerated as an approximation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transient log store error: {0}")]
    Transient(String),

    #[error("operation interrupted")]
    Interrupted,

    #[error("data integrity violation: {0}")]
    Integrity(String),

    #[error("contract violation: {0}")]
    Contract(String),
}

impl Error {
    /// Whether the retry wrapper may attempt this operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
