//! Unit tests for the request-coalescing coordinator
//!
//! All tests run on a paused clock, so timing assertions are exact.

use std::sync::Arc;
use std::time::Duration;

use ppc::cache::{CacheSettings, PreviewStore};
use ppc::fetch::BatchFetchCoordinator;

use crate::helpers::{default_cache, fetch_settings, memory_cache, pattern_ids, record, FakeSource};

fn coordinator(
    source: &Arc<FakeSource>,
) -> (Arc<ppc::CacheManager>, BatchFetchCoordinator) {
    let cache = default_cache();
    let coordinator = BatchFetchCoordinator::new(cache.clone(), source.clone(), fetch_settings());
    (cache, coordinator)
}

#[tokio::test(start_paused = true)]
async fn requests_within_window_become_one_call() {
    let source = Arc::new(FakeSource::new());
    let (cache, coordinator) = coordinator(&source);

    coordinator.request("a.thr");
    coordinator.request("b.thr");
    coordinator.request("a.thr");
    coordinator.request("c.thr");
    assert_eq!(coordinator.pending_count(), 3);
    assert!(coordinator.is_pending("a.thr"));

    coordinator.wait_idle().await;

    assert_eq!(source.call_ids(), vec![vec!["a.thr", "b.thr", "c.thr"]]);
    assert!(!coordinator.is_pending("a.thr"));
    assert_eq!(cache.batch_get(&["a.thr".to_string(), "c.thr".to_string()]).await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn each_new_request_restarts_the_window() {
    let source = Arc::new(FakeSource::new());
    let (_cache, coordinator) = coordinator(&source);
    let start = tokio::time::Instant::now();

    coordinator.request("a.thr");
    tokio::time::sleep(Duration::from_millis(30)).await;
    coordinator.request("b.thr");
    tokio::time::sleep(Duration::from_millis(30)).await;

    // 60ms after the first request, but only 30ms after the last one
    assert_eq!(source.call_count(), 0);

    coordinator.wait_idle().await;
    let calls = source.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].ids, vec!["a.thr", "b.thr"]);
    assert!(calls[0].started - start >= Duration::from_millis(80));
}

#[tokio::test(start_paused = true)]
async fn many_requests_are_fetched_in_chunks() {
    let source = Arc::new(FakeSource::new());
    let (_cache, coordinator) = coordinator(&source);

    let ids = pattern_ids(25);
    coordinator.prefetch(&ids);
    coordinator.wait_idle().await;

    assert_eq!(source.call_sizes(), vec![10, 10, 5]);
    let fetched: Vec<String> = source.call_ids().into_iter().flatten().collect();
    assert_eq!(fetched, ids);
}

#[tokio::test(start_paused = true)]
async fn request_during_fetch_starts_a_new_window() {
    let source = Arc::new(FakeSource::new().with_delay(Duration::from_millis(200)));
    let (_cache, coordinator) = coordinator(&source);

    coordinator.request("a.thr");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(source.call_count(), 1);

    coordinator.request("b.thr");
    assert!(coordinator.is_pending("b.thr"));
    coordinator.wait_idle().await;

    let calls = source.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].ids, vec!["a.thr"]);
    assert_eq!(calls[1].ids, vec!["b.thr"]);
    // The second window did not wait for the first session to finish
    assert!(calls[1].started - calls[0].started < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn ids_in_memory_are_not_requested() {
    let source = Arc::new(FakeSource::new());
    let (cache, coordinator) = coordinator(&source);
    cache.put("a.thr", record(8)).await;

    coordinator.request("a.thr");
    assert!(!coordinator.is_pending("a.thr"));
    assert_eq!(coordinator.pending_count(), 0);

    coordinator.wait_idle().await;
    assert_eq!(source.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn ids_in_persistent_tier_skip_the_network() {
    let source = Arc::new(FakeSource::new());
    let (_store, _clock, cache) = memory_cache(CacheSettings {
        max_bytes: 10_000,
        memory_capacity: 1,
    });
    cache.put("a.thr", record(8)).await;
    cache.put("b.thr", record(8)).await;
    assert!(!cache.contains_in_memory("a.thr"));

    let coordinator = BatchFetchCoordinator::new(cache.clone(), source.clone(), fetch_settings());
    coordinator.request("a.thr");
    coordinator.request("c.thr");
    assert!(coordinator.is_pending("a.thr"));

    coordinator.wait_idle().await;
    assert_eq!(source.call_ids(), vec![vec!["c.thr"]]);
}

#[tokio::test(start_paused = true)]
async fn cancel_aborts_in_flight_session() {
    let source = Arc::new(FakeSource::new().with_delay(Duration::from_secs(1)));
    let (cache, coordinator) = coordinator(&source);

    let ids = pattern_ids(15);
    coordinator.prefetch(&ids);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(coordinator.active_sessions(), 1);

    coordinator.cancel();
    coordinator.wait_idle().await;

    assert_eq!(source.call_count(), 1);
    assert_eq!(coordinator.active_sessions(), 0);
    assert!(cache.batch_get(&ids).await.is_empty());

    // The coordinator keeps working after a cancel
    coordinator.request("after.thr");
    coordinator.wait_idle().await;
    assert_eq!(source.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn error_results_are_not_cached() {
    let source = Arc::new(FakeSource::new().with_error_for("broken.thr"));
    let (store, _clock, cache) = memory_cache(CacheSettings::default());
    let coordinator = BatchFetchCoordinator::new(cache.clone(), source.clone(), fetch_settings());

    coordinator.request("fine.thr");
    coordinator.request("broken.thr");
    coordinator.wait_idle().await;

    assert!(cache.contains_in_memory("fine.thr"));
    assert!(store.get("fine.thr").await.unwrap().is_some());
    assert!(!cache.contains_in_memory("broken.thr"));
    assert!(store.get("broken.thr").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_chunk_does_not_stop_the_session() {
    let source = Arc::new(FakeSource::new().failing_on(0));
    let (cache, coordinator) = coordinator(&source);

    let ids = pattern_ids(15);
    coordinator.prefetch(&ids);
    coordinator.wait_idle().await;

    assert_eq!(source.call_sizes(), vec![10, 5]);
    let cached = cache.batch_get(&ids).await;
    assert_eq!(cached.len(), 5);
    assert!(cached.contains_key(&ids[14]));
    assert!(!cached.contains_key(&ids[0]));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_coordinator_discards_pending_ids() {
    let source = Arc::new(FakeSource::new());
    let (_cache, coordinator) = coordinator(&source);

    coordinator.request("a.thr");
    drop(coordinator);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(source.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_sessions_and_pending() {
    let source = Arc::new(FakeSource::new().with_delay(Duration::from_secs(1)));
    let (_cache, coordinator) = coordinator(&source);

    coordinator.request("a.thr");
    tokio::time::sleep(Duration::from_millis(60)).await;
    coordinator.request("b.thr");
    coordinator.shutdown();

    coordinator.wait_idle().await;
    assert_eq!(coordinator.pending_count(), 0);
    assert_eq!(source.call_ids(), vec![vec!["a.thr"]]);
}
