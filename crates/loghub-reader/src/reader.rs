//! The offset reader: lifecycle, shard enumeration, cursor resolution.
//!
//! A `LogHubOffsetReader` is the synchronous façade an incremental engine
//! drives: enumerate shards, resolve earliest/latest positions, ask the
//! rate limiter how far the next cycle may read. Every public operation is
//! one job on the reader's dedicated worker, wrapped in one retry scope, so
//! a transient failure anywhere in a batch retries the whole batch rather
//! than leaving a half-resolved map behind.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use loghub_client::{ClientPool, Credentials, LogStoreClient};
use loghub_core::{Cursor, Error, HistogramBucket, Result, Shard, SymbolicPosition};
use tracing::debug;

use crate::config::ReaderConfig;
use crate::dispatch::DispatchWorker;
use crate::retry::RetryRunner;

/// Shared state captured by jobs running on the dispatch worker.
pub(crate) struct ReaderInner {
    pub(crate) project: String,
    pub(crate) store: String,
    pub(crate) client: Arc<dyn LogStoreClient>,
    pub(crate) retry: RetryRunner,
    /// Lazily built histogram window; rebuilt once the start position
    /// passes its maximum covered time.
    pub(crate) histogram_cache: Mutex<Option<Vec<HistogramBucket>>>,
}

impl ReaderInner {
    /// Resolve a symbolic position for one shard: token first, then the
    /// approximate write time behind it.
    pub(crate) async fn resolve_position(
        &self,
        shard: Shard,
        position: SymbolicPosition,
    ) -> Result<Cursor> {
        let token = self
            .client
            .get_cursor(&self.project, &self.store, shard, position)
            .await?;
        let epoch_seconds = self
            .client
            .get_cursor_time(&self.project, &self.store, shard, &token)
            .await?;
        Ok(Cursor {
            epoch_seconds,
            token,
        })
    }

    /// Resolve a symbolic position for every shard.
    ///
    /// With `known` the enumeration round-trip is skipped. Runs as one unit:
    /// the caller's retry scope repeats the whole batch on failure.
    pub(crate) async fn resolve_all(
        &self,
        position: SymbolicPosition,
        known: Option<&HashSet<Shard>>,
    ) -> Result<HashMap<Shard, Cursor>> {
        let shards: Vec<Shard> = match known {
            Some(shards) => shards.iter().copied().collect(),
            None => {
                self.client
                    .list_shards(&self.project, &self.store)
                    .await?
            }
        };

        let mut offsets = HashMap::with_capacity(shards.len());
        for shard in shards {
            let cursor = self.resolve_position(shard, position).await?;
            offsets.insert(shard, cursor);
        }
        Ok(offsets)
    }
}

/// Reads positions from a remote, shard-partitioned log store in bounded
/// increments.
///
/// Construction validates configuration eagerly and spawns the dedicated
/// worker; see the crate docs for the execution model. The reader is
/// `Send + Sync`; concurrent calls are serialized end-to-end by the retry
/// scope's instance lock.
pub struct LogHubOffsetReader {
    inner: Arc<ReaderInner>,
    worker: DispatchWorker,
}

impl std::fmt::Debug for LogHubOffsetReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHubOffsetReader")
            .field("project", &self.inner.project)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl LogHubOffsetReader {
    pub fn builder() -> LogHubOffsetReaderBuilder {
        LogHubOffsetReaderBuilder::new()
    }

    /// Enumerate the current shard set of the store.
    ///
    /// The set may grow over time, so it is fetched fresh on every call.
    pub fn fetch_shards(&self) -> Result<HashSet<Shard>> {
        let inner = Arc::clone(&self.inner);
        self.worker.run(move |runtime| {
            inner.retry.run(runtime, || {
                runtime
                    .block_on(inner.client.list_shards(&inner.project, &inner.store))
                    .map(|shards| shards.into_iter().collect())
            })
        })
    }

    /// Resolve a symbolic position of one shard to a concrete cursor.
    ///
    /// Two remote calls: obtain the opaque token for the position, then the
    /// approximate write time behind it.
    pub fn resolve_position(&self, shard: Shard, position: SymbolicPosition) -> Result<Cursor> {
        let inner = Arc::clone(&self.inner);
        self.worker.run(move |runtime| {
            inner.retry.run(runtime, || {
                runtime.block_on(inner.resolve_position(shard, position))
            })
        })
    }

    /// Resolve the earliest readable position of every shard.
    pub fn fetch_earliest_offsets(&self) -> Result<HashMap<Shard, Cursor>> {
        self.fetch_offsets(SymbolicPosition::Earliest, None)
    }

    /// Resolve the earliest readable position of each shard in `shards`,
    /// skipping re-enumeration when the shard set is already known.
    pub fn fetch_earliest_offsets_for(
        &self,
        shards: &HashSet<Shard>,
    ) -> Result<HashMap<Shard, Cursor>> {
        self.fetch_offsets(SymbolicPosition::Earliest, Some(shards.clone()))
    }

    /// Resolve the latest position of every shard.
    pub fn fetch_latest_offsets(&self) -> Result<HashMap<Shard, Cursor>> {
        self.fetch_offsets(SymbolicPosition::Latest, None)
    }

    fn fetch_offsets(
        &self,
        position: SymbolicPosition,
        known: Option<HashSet<Shard>>,
    ) -> Result<HashMap<Shard, Cursor>> {
        let inner = Arc::clone(&self.inner);
        self.worker.run(move |runtime| {
            inner.retry.run(runtime, || {
                runtime.block_on(inner.resolve_all(position, known.as_ref()))
            })
        })
    }

    /// Compute the farthest safe ending position for one read cycle.
    ///
    /// `start_offset` is the cycle's starting position in epoch seconds;
    /// `max_records_per_cycle` bounds how many records the cycle should
    /// advance past. The result is always `>= start_offset`.
    ///
    /// When the start position lags the wall clock by at most 60 seconds,
    /// the unread backlog is assumed small and the minimum latest position
    /// across shards comes back directly; the budget is not applied on
    /// that path, so the first cycle after a short pause may exceed it.
    /// Beyond 60 seconds of lag the budget is required and the answer is
    /// derived from histogram sampling; see [`crate::rate_limiter`].
    pub fn rate_limit(
        &self,
        start_offset: i64,
        max_records_per_cycle: Option<i64>,
    ) -> Result<i64> {
        let inner = Arc::clone(&self.inner);
        self.worker.run(move |runtime| {
            inner.retry.run(runtime, || {
                inner.compute_end_position(runtime, start_offset, max_records_per_cycle)
            })
        })
    }

    /// Shut the reader down.
    ///
    /// Cancels any in-flight retry loop (it surfaces as
    /// [`Error::Interrupted`] to its caller), stops the worker, and drops
    /// the reference to the remote client handle. Consuming `self` makes
    /// reuse after close unrepresentable.
    pub fn close(self) {
        self.worker.shutdown();
        debug!(
            project = %self.inner.project,
            store = %self.inner.store,
            "offset reader closed"
        );
    }
}

/// Builder for [`LogHubOffsetReader`].
///
/// ```ignore
/// let reader = LogHubOffsetReader::builder()
///     .config_map(&options)
///     .pool(Arc::clone(&pool))
///     .build()?;
/// ```
pub struct LogHubOffsetReaderBuilder {
    config: Option<ReaderConfig>,
    config_map: Option<HashMap<String, String>>,
    pool: Option<Arc<ClientPool>>,
}

impl LogHubOffsetReaderBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            config_map: None,
            pool: None,
        }
    }

    /// Use an already-built configuration.
    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Parse configuration from a flat string-keyed map at build time.
    pub fn config_map(mut self, map: &HashMap<String, String>) -> Self {
        self.config_map = Some(map.clone());
        self
    }

    /// The client cache shared across readers in this process.
    pub fn pool(mut self, pool: Arc<ClientPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validate configuration, obtain the client handle, and spawn the
    /// dispatch worker.
    ///
    /// Fails fast: a missing required key, an absent pool, or a client the
    /// factory cannot build all surface here, before any read is attempted.
    pub fn build(self) -> Result<LogHubOffsetReader> {
        let config = match (self.config, self.config_map) {
            (Some(config), _) => {
                config.validate()?;
                config
            }
            (None, Some(map)) => ReaderConfig::from_config_map(&map)?,
            (None, None) => {
                return Err(Error::Config("reader configuration is required".into()))
            }
        };
        let pool = self
            .pool
            .ok_or_else(|| Error::Config("client pool is required".into()))?;

        let credentials = Credentials {
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.clone(),
        };
        let client = pool.get_or_create(&credentials, &config.endpoint)?;

        let worker = DispatchWorker::spawn(format!(
            "loghub-reader-{}-{}",
            config.project, config.store
        ))?;
        let retry = RetryRunner::new(
            config.max_offset_fetch_attempts,
            config.offset_fetch_retry_interval,
            worker.thread_id(),
            worker.cancel_token(),
        );

        debug!(
            project = %config.project,
            store = %config.store,
            endpoint = %config.endpoint,
            max_attempts = config.max_offset_fetch_attempts,
            "offset reader constructed"
        );

        Ok(LogHubOffsetReader {
            inner: Arc::new(ReaderInner {
                project: config.project,
                store: config.store,
                client,
                retry,
                histogram_cache: Mutex::new(None),
            }),
            worker,
        })
    }
}

impl Default for LogHubOffsetReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
