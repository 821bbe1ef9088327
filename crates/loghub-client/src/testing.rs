//! Scripted in-memory client for tests.
//!
//! Plays the role of the remote log store the way an in-memory metadata
//! store backs database-facing tests: shard sets, per-shard earliest/latest
//! times, and histogram buckets are configured up front, every operation is
//! counted, and failures or incomplete replies can be injected.
//!
//! ```ignore
//! let client = MockLogStoreClient::new()
//!     .with_shard(Shard(0), 1_000, 2_000)
//!     .with_shard(Shard(1), 1_100, 1_900)
//!     .with_buckets(vec![HistogramBucket { from_time: 1_000, to_time: 1_060, count: 10 }]);
//! pool.insert("AKID", "http://endpoint", Arc::new(client));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use loghub_core::{Error, HistogramBatch, HistogramBucket, Result, Shard, SymbolicPosition};

use crate::client::LogStoreClient;

/// Per-operation call counters, readable from tests.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub list_shards: AtomicUsize,
    pub get_cursor: AtomicUsize,
    pub get_cursor_time: AtomicUsize,
    pub get_histograms: AtomicUsize,
}

/// A [`LogStoreClient`] whose answers are scripted in memory.
#[derive(Debug, Default)]
pub struct MockLogStoreClient {
    shards: Mutex<Vec<Shard>>,
    earliest: Mutex<HashMap<Shard, i64>>,
    latest: Mutex<HashMap<Shard, i64>>,
    buckets: Mutex<Vec<HistogramBucket>>,
    scripted_batches: Mutex<VecDeque<HistogramBatch>>,
    incomplete_replies: AtomicU32,
    transient_failures: AtomicU32,
    pub calls: CallCounts,
}

impl MockLogStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shard with its earliest and latest cursor times.
    pub fn with_shard(self, shard: Shard, earliest: i64, latest: i64) -> Self {
        self.shards
            .lock()
            .expect("mock shards lock")
            .push(shard);
        self.earliest
            .lock()
            .expect("mock earliest lock")
            .insert(shard, earliest);
        self.latest
            .lock()
            .expect("mock latest lock")
            .insert(shard, latest);
        self
    }

    /// Set the histogram buckets served by range queries.
    ///
    /// A query for `[from, to)` returns every configured bucket whose
    /// `from_time` falls inside that range.
    pub fn with_buckets(self, buckets: Vec<HistogramBucket>) -> Self {
        *self.buckets.lock().expect("mock buckets lock") = buckets;
        self
    }

    /// Queue a verbatim reply for the next histogram query.
    ///
    /// Scripted replies take precedence over range-served buckets; use this
    /// to hand back malformed or partial batches.
    pub fn with_scripted_batch(self, batch: HistogramBatch) -> Self {
        self.scripted_batches
            .lock()
            .expect("mock scripted lock")
            .push_back(batch);
        self
    }

    /// Make the next `n` calls (of any operation) fail transiently.
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Mark the next `n` histogram replies incomplete.
    pub fn with_incomplete_replies(self, n: u32) -> Self {
        self.incomplete_replies.store(n, Ordering::SeqCst);
        self
    }

    fn take_injected_failure(&self) -> Result<()> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Transient("injected transient failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LogStoreClient for MockLogStoreClient {
    async fn list_shards(&self, _project: &str, _store: &str) -> Result<Vec<Shard>> {
        self.calls.list_shards.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure()?;
        Ok(self.shards.lock().expect("mock shards lock").clone())
    }

    async fn get_cursor(
        &self,
        _project: &str,
        _store: &str,
        shard: Shard,
        position: SymbolicPosition,
    ) -> Result<String> {
        self.calls.get_cursor.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure()?;
        Ok(format!("{}:{}", shard.0, position))
    }

    async fn get_cursor_time(
        &self,
        _project: &str,
        _store: &str,
        shard: Shard,
        token: &str,
    ) -> Result<i64> {
        self.calls.get_cursor_time.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure()?;
        let time = match token.strip_prefix(&format!("{}:", shard.0)) {
            Some("begin") => self
                .earliest
                .lock()
                .expect("mock earliest lock")
                .get(&shard)
                .copied(),
            Some("end") => self
                .latest
                .lock()
                .expect("mock latest lock")
                .get(&shard)
                .copied(),
            _ => None,
        };
        time.ok_or_else(|| Error::Transient(format!("unknown cursor token '{token}'")))
    }

    async fn get_histograms(
        &self,
        _project: &str,
        _store: &str,
        from_time: i64,
        to_time: i64,
        _query: &str,
        _topic: &str,
    ) -> Result<HistogramBatch> {
        self.calls.get_histograms.fetch_add(1, Ordering::SeqCst);
        self.take_injected_failure()?;

        if let Some(batch) = self
            .scripted_batches
            .lock()
            .expect("mock scripted lock")
            .pop_front()
        {
            return Ok(batch);
        }

        let buckets: Vec<HistogramBucket> = self
            .buckets
            .lock()
            .expect("mock buckets lock")
            .iter()
            .filter(|b| b.from_time >= from_time && b.from_time < to_time)
            .copied()
            .collect();

        let remaining = self.incomplete_replies.load(Ordering::SeqCst);
        let complete = if remaining > 0 {
            self.incomplete_replies.store(remaining - 1, Ordering::SeqCst);
            false
        } else {
            true
        };

        Ok(HistogramBatch { complete, buckets })
    }
}
