//! Core types for reading from a shard-partitioned, append-only log store.
//!
//! This crate defines the vocabulary shared by the client and reader crates:
//! shards, cursors (resumable positions), histogram buckets (approximate
//! record counts over a time range), and the error taxonomy used across the
//! workspace.
//!
//! Positions are the unit a host engine checkpoints externally, so the value
//! types here all serialize.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Cursor, HistogramBatch, HistogramBucket, Shard, SymbolicPosition};
