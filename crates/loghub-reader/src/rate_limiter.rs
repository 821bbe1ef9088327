//! Histogram-based rate limiting: turn a per-cycle record budget into a
//! safe ending position.
//!
//! Exact counting would mean scanning the store, so the limiter samples
//! approximate record-count histograms instead and accepts bounded
//! statistical error for O(window) remote calls.
//!
//! ## Range selection
//!
//! Bucket width adapts to how far behind the start position is:
//!
//! ```text
//! lag <= 60s     fast path: no histograms, consume to the minimum
//!                latest position across shards
//! lag <= 300s    60s buckets over at most 300s of window
//! lag >  300s    300s buckets over at most 21600s (6h) of window
//! ```
//!
//! Fine buckets near the frontier keep the estimate sharp where cycles
//! actually land; coarse buckets further back keep the call count bounded
//! during deep catch-up.
//!
//! ## Caching
//!
//! The sampled window is cached per reader. While the start position walks
//! through a cached window only the accumulation step reruns; once the
//! start passes the window's maximum covered time the whole window is
//! resampled from the new start. Stale buckets behind the start are
//! filtered out, never counted.
//!
//! ## Integrity
//!
//! The service promises temporal ordering of buckets. A batch whose
//! `from_time` values do not strictly increase, or an ending position that
//! lands behind its start, is a fatal integrity error; neither is retried.

use loghub_core::{Error, HistogramBatch, HistogramBucket, Result, SymbolicPosition};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::reader::ReaderInner;

/// Lags at or below this are consumed without sampling.
const LOW_LAG_THRESHOLD_SECS: i64 = 60;
/// Above this lag the coarse bucket width applies.
const COARSE_LAG_THRESHOLD_SECS: i64 = 300;
const FINE_BUCKET_WIDTH_SECS: i64 = 60;
const COARSE_BUCKET_WIDTH_SECS: i64 = 300;
/// The sampled window never reaches further than this past the start.
const MAX_SAMPLE_WINDOW_SECS: i64 = 21_600;
/// Immediate re-queries of an incomplete histogram reply.
const MAX_INCOMPLETE_REQUERIES: u32 = 10;

impl ReaderInner {
    /// Core of [`crate::LogHubOffsetReader::rate_limit`]; runs on the
    /// dispatch worker inside the retry scope.
    pub(crate) fn compute_end_position(
        &self,
        runtime: &Runtime,
        start_offset: i64,
        max_records_per_cycle: Option<i64>,
    ) -> Result<i64> {
        let lag = now_secs() - start_offset;

        if lag <= LOW_LAG_THRESHOLD_SECS {
            // Small backlog: a precise estimate is not worth the histogram
            // round-trips. Consume everything currently available. The
            // budget is knowingly not applied here.
            let latest = runtime.block_on(self.resolve_all(SymbolicPosition::Latest, None))?;
            let end = latest
                .values()
                .map(|cursor| cursor.epoch_seconds)
                .min()
                .unwrap_or(start_offset);
            ensure_not_behind(start_offset, end)?;
            debug!(start_offset, end, lag, "low-lag fast path");
            return Ok(end);
        }

        let budget = max_records_per_cycle.ok_or_else(|| {
            Error::Contract(
                "max_records_per_cycle is required once lag exceeds the low-lag threshold".into(),
            )
        })?;

        let mut cache = self
            .histogram_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let stale = match cache.as_ref() {
            None => true,
            // The window is fully consumed once its maximum covered time is
            // at or behind the start.
            Some(buckets) => buckets.last().is_none_or(|b| b.to_time <= start_offset),
        };
        if stale {
            *cache = Some(self.sample_window(runtime, start_offset, lag)?);
        }

        let end = accumulate(cache.as_deref().unwrap_or(&[]), start_offset, budget);
        ensure_not_behind(start_offset, end)?;
        Ok(end)
    }

    /// Query one histogram window starting at `start_offset` and validate
    /// its ordering.
    fn sample_window(
        &self,
        runtime: &Runtime,
        start_offset: i64,
        lag: i64,
    ) -> Result<Vec<HistogramBucket>> {
        let (width, count) = bucket_layout(lag);
        let mut window = Vec::new();
        for i in 0..count {
            let from = start_offset + i * width;
            let batch = self.query_histograms(runtime, from, from + width)?;
            window.extend(batch.buckets);
        }
        validate_ordering(&window)?;
        debug!(
            start_offset,
            lag,
            bucket_width = width,
            ranges = count,
            buckets = window.len(),
            "sampled histogram window"
        );
        Ok(window)
    }

    /// One histogram query with bounded immediate re-queries while the
    /// service reports the reply incomplete. A reply that stays incomplete
    /// is used anyway; the estimate degrades, the operation does not fail.
    fn query_histograms(
        &self,
        runtime: &Runtime,
        from_time: i64,
        to_time: i64,
    ) -> Result<HistogramBatch> {
        let mut requeries = 0u32;
        loop {
            let batch = runtime.block_on(self.client.get_histograms(
                &self.project,
                &self.store,
                from_time,
                to_time,
                "",
                "*",
            ))?;
            if batch.complete {
                return Ok(batch);
            }
            if requeries >= MAX_INCOMPLETE_REQUERIES {
                warn!(
                    from_time,
                    to_time,
                    requeries,
                    "histogram reply still incomplete, using approximate counts"
                );
                return Ok(batch);
            }
            requeries += 1;
        }
    }
}

/// Bucket width and number of consecutive ranges to query for a lag.
pub(crate) fn bucket_layout(lag: i64) -> (i64, i64) {
    if lag > COARSE_LAG_THRESHOLD_SECS {
        (
            COARSE_BUCKET_WIDTH_SECS,
            lag.min(MAX_SAMPLE_WINDOW_SECS) / COARSE_BUCKET_WIDTH_SECS,
        )
    } else {
        (
            FINE_BUCKET_WIDTH_SECS,
            lag.min(COARSE_LAG_THRESHOLD_SECS) / FINE_BUCKET_WIDTH_SECS,
        )
    }
}

/// Walk buckets at or past the start in order, adding counts while the
/// running total is still under budget; the end lands on the `to_time` of
/// the last bucket taken. With nothing to take the end stays at the start.
pub(crate) fn accumulate(buckets: &[HistogramBucket], start_offset: i64, budget: i64) -> i64 {
    let mut total: i64 = 0;
    let mut end = start_offset;
    for bucket in buckets.iter().filter(|b| b.from_time >= start_offset) {
        if total >= budget {
            break;
        }
        total += bucket.count;
        end = bucket.to_time;
    }
    end
}

/// The service promises strictly increasing `from_time` per query round.
pub(crate) fn validate_ordering(buckets: &[HistogramBucket]) -> Result<()> {
    for pair in buckets.windows(2) {
        if pair[1].from_time <= pair[0].from_time {
            return Err(Error::Integrity(format!(
                "histogram bucket at {} does not advance past {}",
                pair[1].from_time, pair[0].from_time
            )));
        }
    }
    Ok(())
}

fn ensure_not_behind(start_offset: i64, end: i64) -> Result<()> {
    if end < start_offset {
        return Err(Error::Integrity(format!(
            "ending position {end} is behind starting position {start_offset}"
        )));
    }
    Ok(())
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}
