//! Offset reader and histogram rate limiter for a remote, shard-partitioned,
//! append-only log store.
//!
//! The reader lets an incremental-consumption engine advance through a log
//! store in bounded increments: it enumerates shards, resolves symbolic
//! positions ("earliest"/"latest") into concrete `(time, token)` cursors,
//! and answers the question that drives each processing cycle: *given where
//! I am and how many records one cycle may consume, how far may I read?*
//! That answer comes from coarse histogram sampling, never from exact
//! counting.
//!
//! ## Architecture
//!
//! ```text
//! caller thread                dedicated worker thread (one per reader)
//! ─────────────                ────────────────────────────────────────
//! fetch_shards() ──┐
//! rate_limit()   ──┼─ job ──▶  ┌─────────────────────────────┐
//!                  │  queue    │ RetryRunner (bounded, fixed │
//!   blocks on  ◀───┘           │ interval, whole-call scope) │
//!   reply                      │   └─▶ LogStoreClient calls  │
//!                              └─────────────────────────────┘
//! ```
//!
//! The remote client is not safe to call concurrently or to interrupt
//! mid-call, so every remote operation runs on the reader's single worker
//! thread; callers block (without timeout) until the worker replies.
//! Closing the reader cancels in-flight retry loops, which surface as
//! [`loghub_core::Error::Interrupted`].
//!
//! ## Example
//!
//! ```ignore
//! use loghub_reader::LogHubOffsetReader;
//!
//! let reader = LogHubOffsetReader::builder()
//!     .config_map(&options)
//!     .pool(pool)
//!     .build()?;
//!
//! let start = reader.fetch_earliest_offsets()?;
//! let until = reader.rate_limit(start_secs, Some(100_000))?;
//! // ... consume records up to `until`, checkpoint, repeat ...
//! reader.close();
//! ```

pub mod config;
mod dispatch;
pub mod rate_limiter;
pub mod reader;
mod retry;

pub use config::ReaderConfig;
pub use reader::{LogHubOffsetReader, LogHubOffsetReaderBuilder};
