//! The capability interface a log store client must provide.
//!
//! The reader needs exactly four remote operations. Everything else the
//! service offers (writing, querying payloads, project administration) is
//! out of scope, so the trait stays narrow on purpose: a concrete client
//! wraps whatever SDK or transport it likes and maps its failures into the
//! shared error taxonomy.
//!
//! Implementations are not assumed to be safe to call concurrently or to
//! interrupt mid-call. The reader funnels every invocation through one
//! dedicated worker thread per reader instance, so an implementation only
//! ever sees sequential calls from a single thread.

use async_trait::async_trait;
use loghub_core::{HistogramBatch, Result, Shard, SymbolicPosition};

/// Access credentials for a log store endpoint.
///
/// The secret participates only in client construction; the client cache is
/// keyed by `(access_key_id, endpoint)` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

/// Narrow view of a remote, shard-partitioned log store.
///
/// Failures that may succeed on a repeat call must be reported as
/// [`loghub_core::Error::Transient`]; the reader's retry wrapper dispatches
/// on that variant and propagates everything else unchanged.
#[async_trait]
pub trait LogStoreClient: std::fmt::Debug + Send + Sync {
    /// Enumerate the shards of `store` within `project`.
    async fn list_shards(&self, project: &str, store: &str) -> Result<Vec<Shard>>;

    /// Obtain an opaque cursor token for a symbolic position of one shard.
    async fn get_cursor(
        &self,
        project: &str,
        store: &str,
        shard: Shard,
        position: SymbolicPosition,
    ) -> Result<String>;

    /// Resolve a cursor token to the approximate write time it points at,
    /// in seconds since the Unix epoch.
    async fn get_cursor_time(
        &self,
        project: &str,
        store: &str,
        shard: Shard,
        token: &str,
    ) -> Result<i64>;

    /// Fetch approximate record-count buckets for `[from_time, to_time)`.
    ///
    /// `query` narrows the count to matching records (empty string for all)
    /// and `topic` to one topic (`"*"` for all). The reply may be marked
    /// incomplete; callers decide how hard to re-query.
    async fn get_histograms(
        &self,
        project: &str,
        store: &str,
        from_time: i64,
        to_time: i64,
        query: &str,
        topic: &str,
    ) -> Result<HistogramBatch>;
}
