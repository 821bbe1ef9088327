//! Integration tests for shard enumeration and cursor resolution.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use loghub_client::testing::MockLogStoreClient;
use loghub_client::{ClientFactory, ClientPool, LogStoreClient};
use loghub_core::{Error, Shard, SymbolicPosition};
use loghub_reader::LogHubOffsetReader;

const ENDPOINT: &str = "http://sls.example.com";

fn config_map(num_retries: u32, retry_interval_ms: u64) -> HashMap<String, String> {
    [
        ("sls.project", "test-project".to_string()),
        ("sls.store", "test-store".to_string()),
        ("access.key.id", "AKID".to_string()),
        ("access.key.secret", "SECRET".to_string()),
        ("endpoint", ENDPOINT.to_string()),
        ("fetchOffset.numRetries", num_retries.to_string()),
        ("fetchOffset.retryIntervalMs", retry_interval_ms.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn build_reader(
    mock: &Arc<MockLogStoreClient>,
    num_retries: u32,
    retry_interval_ms: u64,
) -> LogHubOffsetReader {
    let factory: ClientFactory =
        Arc::new(|_credentials, _endpoint| panic!("tests seed the pool explicitly"));
    let pool = Arc::new(ClientPool::new(factory));
    pool.insert(
        "AKID",
        ENDPOINT,
        Arc::clone(mock) as Arc<dyn LogStoreClient>,
    );

    LogHubOffsetReader::builder()
        .config_map(&config_map(num_retries, retry_interval_ms))
        .pool(pool)
        .build()
        .expect("reader should build")
}

#[test]
fn fetch_shards_enumerates_the_store() {
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_shard(Shard(0), 1_000, 2_000)
            .with_shard(Shard(1), 1_100, 1_900),
    );
    let reader = build_reader(&mock, 3, 1);

    let shards = reader.fetch_shards().unwrap();
    assert_eq!(shards, HashSet::from([Shard(0), Shard(1)]));
    assert_eq!(mock.calls.list_shards.load(Ordering::SeqCst), 1);

    reader.close();
}

#[test]
fn offset_maps_have_one_entry_per_shard_with_earliest_not_after_latest() {
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_shard(Shard(0), 1_000, 2_000)
            .with_shard(Shard(1), 1_100, 1_900)
            .with_shard(Shard(2), 1_500, 1_500),
    );
    let reader = build_reader(&mock, 3, 1);

    let earliest = reader.fetch_earliest_offsets().unwrap();
    let latest = reader.fetch_latest_offsets().unwrap();

    assert_eq!(earliest.len(), 3);
    assert_eq!(latest.len(), 3);
    for shard in [Shard(0), Shard(1), Shard(2)] {
        let from = &earliest[&shard];
        let to = &latest[&shard];
        assert!(
            from.epoch_seconds <= to.epoch_seconds,
            "{shard}: earliest {} after latest {}",
            from.epoch_seconds,
            to.epoch_seconds
        );
        assert!(!from.token.is_empty());
    }
    assert_eq!(earliest[&Shard(0)].epoch_seconds, 1_000);
    assert_eq!(latest[&Shard(0)].epoch_seconds, 2_000);

    reader.close();
}

#[test]
fn resolve_position_goes_token_then_time() {
    let mock = Arc::new(MockLogStoreClient::new().with_shard(Shard(4), 1_000, 2_000));
    let reader = build_reader(&mock, 3, 1);

    let earliest = reader
        .resolve_position(Shard(4), SymbolicPosition::Earliest)
        .unwrap();
    let latest = reader
        .resolve_position(Shard(4), SymbolicPosition::Latest)
        .unwrap();

    assert_eq!(earliest.epoch_seconds, 1_000);
    assert_eq!(latest.epoch_seconds, 2_000);
    assert_ne!(earliest.token, latest.token);
    assert_eq!(mock.calls.get_cursor.load(Ordering::SeqCst), 2);
    assert_eq!(mock.calls.get_cursor_time.load(Ordering::SeqCst), 2);

    reader.close();
}

#[test]
fn known_shard_set_skips_re_enumeration() {
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_shard(Shard(0), 1_000, 2_000)
            .with_shard(Shard(1), 1_100, 1_900),
    );
    let reader = build_reader(&mock, 3, 1);

    let known = HashSet::from([Shard(0), Shard(1)]);
    let earliest = reader.fetch_earliest_offsets_for(&known).unwrap();

    assert_eq!(earliest.len(), 2);
    assert_eq!(mock.calls.list_shards.load(Ordering::SeqCst), 0);
    // Two calls per shard: token, then its time.
    assert_eq!(mock.calls.get_cursor.load(Ordering::SeqCst), 2);
    assert_eq!(mock.calls.get_cursor_time.load(Ordering::SeqCst), 2);

    reader.close();
}

#[test]
fn exhausted_retries_make_exactly_the_configured_attempts() {
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_shard(Shard(0), 1_000, 2_000)
            .with_transient_failures(100),
    );
    let reader = build_reader(&mock, 2, 1);

    let err = reader.fetch_shards().unwrap_err();
    assert!(matches!(err, Error::Transient(_)));
    assert_eq!(mock.calls.list_shards.load(Ordering::SeqCst), 2);

    reader.close();
}

#[test]
fn a_transient_failure_mid_batch_retries_the_whole_batch() {
    let mock = Arc::new(
        MockLogStoreClient::new()
            .with_shard(Shard(0), 1_000, 2_000)
            .with_shard(Shard(1), 1_100, 1_900)
            // First call of the first attempt fails; the retry starts the
            // batch over from shard enumeration.
            .with_transient_failures(1),
    );
    let reader = build_reader(&mock, 3, 1);

    let earliest = reader.fetch_earliest_offsets().unwrap();
    assert_eq!(earliest.len(), 2);
    assert_eq!(mock.calls.list_shards.load(Ordering::SeqCst), 2);

    reader.close();
}

#[test]
fn missing_required_config_fails_at_build() {
    let factory: ClientFactory =
        Arc::new(|_credentials, _endpoint| panic!("never reached"));
    let pool = Arc::new(ClientPool::new(factory));

    let mut map = config_map(3, 1);
    map.remove("sls.project");

    let err = LogHubOffsetReader::builder()
        .config_map(&map)
        .pool(pool)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Config(m) if m.contains("sls.project")));
}
