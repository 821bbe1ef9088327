//! Integration tests for the histogram rate limiter.
//!
//! Start positions are placed relative to the wall clock so the lag lands
//! in the intended regime; the mock serves buckets by queried range, which
//! keeps the scenarios stable even if a little real time passes mid-test.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use loghub_client::testing::MockLogStoreClient;
use loghub_client::{ClientFactory, ClientPool, LogStoreClient};
use loghub_core::{Error, HistogramBatch, HistogramBucket, Shard};
use loghub_reader::LogHubOffsetReader;

const ENDPOINT: &str = "http://sls.example.com";

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn bucket(from_time: i64, to_time: i64, count: i64) -> HistogramBucket {
    HistogramBucket {
        from_time,
        to_time,
        count,
    }
}

fn build_reader(mock: &Arc<MockLogStoreClient>) -> LogHubOffsetReader {
    let factory: ClientFactory =
        Arc::new(|_credentials, _endpoint| panic!("tests seed the pool explicitly"));
    let pool = Arc::new(ClientPool::new(factory));
    pool.insert(
        "AKID",
        ENDPOINT,
        Arc::clone(mock) as Arc<dyn LogStoreClient>,
    );

    let map: HashMap<String, String> = [
        ("sls.project", "test-project"),
        ("sls.store", "test-store"),
        ("access.key.id", "AKID"),
        ("access.key.secret", "SECRET"),
        ("endpoint", ENDPOINT),
        ("fetchOffset.numRetries", "3"),
        ("fetchOffset.retryIntervalMs", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    LogHubOffsetReader::builder()
        .config_map(&map)
        .pool(pool)
        .build()
        .expect("reader should build")
}

#[test]
fn low_lag_returns_the_minimum_latest_position_without_histograms() {
    let now = now_secs();
    let start = now - 30;
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_shard(Shard(0), now - 100, now - 5)
            .with_shard(Shard(1), now - 100, now - 10),
    );
    let reader = build_reader(&mock);

    let end = reader.rate_limit(start, Some(1_000)).unwrap();

    assert_eq!(end, now - 10);
    assert!(end >= start);
    assert_eq!(mock.calls.get_histograms.load(Ordering::SeqCst), 0);

    reader.close();
}

#[test]
fn low_lag_works_without_a_budget() {
    // The fast path knowingly skips the budget; None must be accepted.
    let now = now_secs();
    let start = now - 20;
    let mock = Arc::new(MockLogStoreClient::new().with_shard(Shard(0), now - 100, now - 3));
    let reader = build_reader(&mock);

    let end = reader.rate_limit(start, None).unwrap();
    assert_eq!(end, now - 3);
    assert_eq!(mock.calls.get_histograms.load(Ordering::SeqCst), 0);

    reader.close();
}

#[test]
fn low_lag_rejects_a_latest_position_behind_the_start() {
    let now = now_secs();
    let start = now - 30;
    let mock = Arc::new(MockLogStoreClient::new().with_shard(Shard(0), now - 500, now - 45));
    let reader = build_reader(&mock);

    let err = reader.rate_limit(start, Some(1_000)).unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));

    reader.close();
}

#[test]
fn budget_selects_the_last_bucket_still_under_it() {
    // Five 60s buckets of 10 records each starting at the start position;
    // budget 25 ends at the third bucket's upper bound.
    let now = now_secs();
    let start = now - 240;
    let buckets: Vec<_> = (0..5)
        .map(|i| bucket(start + i * 60, start + (i + 1) * 60, 10))
        .collect();
    let mock = Arc::new(MockLogStoreClient::new().with_buckets(buckets));
    let reader = build_reader(&mock);

    let end = reader.rate_limit(start, Some(25)).unwrap();

    assert_eq!(end, start + 180);
    assert!(end >= start);
    assert!(mock.calls.get_histograms.load(Ordering::SeqCst) >= 1);

    reader.close();
}

#[test]
fn missing_budget_on_the_histogram_path_is_a_contract_violation() {
    let now = now_secs();
    let start = now - 400;
    let mock = Arc::new(MockLogStoreClient::new());
    let reader = build_reader(&mock);

    let err = reader.rate_limit(start, None).unwrap_err();
    assert!(matches!(err, Error::Contract(_)));
    assert_eq!(mock.calls.get_histograms.load(Ordering::SeqCst), 0);

    reader.close();
}

#[test]
fn cached_window_is_reused_and_rebuilt_once_consumed() {
    let now = now_secs();
    // lag ~370: one coarse 300s range [start, start+300).
    let start = now - 370;
    let mock = Arc::new(
        MockLogStoreClient::new().with_buckets(vec![
            bucket(start, start + 300, 50),
            // Served only once the window is resampled from the new start.
            bucket(start + 305, start + 365, 7),
        ]),
    );
    let reader = build_reader(&mock);

    let first = reader.rate_limit(start, Some(1_000)).unwrap();
    assert_eq!(first, start + 300);
    let after_first = mock.calls.get_histograms.load(Ordering::SeqCst);

    // Same start again: the cached window still covers it.
    let repeated = reader.rate_limit(start, Some(1_000)).unwrap();
    assert_eq!(repeated, start + 300);
    assert_eq!(
        mock.calls.get_histograms.load(Ordering::SeqCst),
        after_first
    );

    // Advance past the window's maximum covered time: resample.
    let advanced_start = start + 305;
    let second = reader.rate_limit(advanced_start, Some(1_000)).unwrap();
    assert_eq!(second, start + 365);
    assert!(mock.calls.get_histograms.load(Ordering::SeqCst) > after_first);

    reader.close();
}

#[test]
fn out_of_order_buckets_are_fatal_and_not_retried() {
    let now = now_secs();
    let start = now - 400;
    let mock = Arc::new(
        MockLogStoreClient::new().with_scripted_batch(HistogramBatch {
            complete: true,
            buckets: vec![
                bucket(start + 60, start + 120, 5),
                bucket(start, start + 60, 5),
            ],
        }),
    );
    let reader = build_reader(&mock);

    let err = reader.rate_limit(start, Some(100)).unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));
    // An integrity violation must not consume retry attempts.
    assert_eq!(mock.calls.get_histograms.load(Ordering::SeqCst), 1);

    reader.close();
}

#[test]
fn incomplete_replies_are_requeried_then_tolerated() {
    let now = now_secs();
    let start = now - 400;
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_buckets(vec![bucket(start, start + 300, 30)])
            .with_incomplete_replies(2),
    );
    let reader = build_reader(&mock);

    let end = reader.rate_limit(start, Some(100)).unwrap();

    assert_eq!(end, start + 300);
    // Initial query plus two immediate re-queries before a complete reply.
    assert_eq!(mock.calls.get_histograms.load(Ordering::SeqCst), 3);

    reader.close();
}

#[test]
fn persistently_incomplete_replies_do_not_fail_the_operation() {
    let now = now_secs();
    let start = now - 400;
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_buckets(vec![bucket(start, start + 300, 30)])
            .with_incomplete_replies(1_000),
    );
    let reader = build_reader(&mock);

    let end = reader.rate_limit(start, Some(100)).unwrap();

    assert_eq!(end, start + 300);
    // Initial query plus the bounded ten re-queries.
    assert_eq!(mock.calls.get_histograms.load(Ordering::SeqCst), 11);

    reader.close();
}

#[test]
fn an_empty_window_holds_the_position() {
    // No records behind the lag at all: the end stays at the start rather
    // than regressing or failing.
    let now = now_secs();
    let start = now - 400;
    let mock = Arc::new(MockLogStoreClient::new());
    let reader = build_reader(&mock);

    let end = reader.rate_limit(start, Some(100)).unwrap();
    assert_eq!(end, start);

    reader.close();
}
