//! Unit tests for the filesystem preview store

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use ppc::cache::{CacheManager, CacheSettings, FsPreviewStore, PreviewStore};
use ppc::{CacheEntry, Point, PreviewRecord};

fn entry(id: &str, payload_len: usize, at: i64) -> CacheEntry {
    CacheEntry::new(id, PreviewRecord::new("Q".repeat(payload_len), None, None), at)
}

#[tokio::test]
async fn round_trip_survives_restart() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("previews");
    let record = PreviewRecord::new(
        "data:image/webp;base64,UklGRiQAAABXRUJQ",
        Some(Point::new(0.0, 0.0)),
        Some(Point::new(2.5, 1.0)),
    );

    {
        let cache = CacheManager::new(Arc::new(FsPreviewStore::new(&root)), CacheSettings::default());
        assert!(cache.open().await);
        assert!(cache.put("custom/spiral.thr", record.clone()).await);
    }

    // Fresh process: empty memory tier, same directory
    let cache = CacheManager::new(Arc::new(FsPreviewStore::new(&root)), CacheSettings::default());
    assert!(!cache.contains_in_memory("custom/spiral.thr"));
    let loaded = cache.get("custom/spiral.thr").await.expect("should be persisted");
    assert_eq!(*loaded, record);
}

#[tokio::test]
async fn open_writes_schema_marker() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.open().await.unwrap();

    let marker: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("schema.json")).unwrap()).unwrap();
    assert_eq!(marker["version"], 1);
    assert!(marker.get("indexes").is_none());
    assert!(temp.path().join("entries").is_dir());
}

#[tokio::test]
async fn schema_version_change_discards_entries() {
    let temp = TempDir::new().unwrap();
    {
        let store = FsPreviewStore::new(temp.path());
        store.put(&entry("a.thr", 8, 1)).await.unwrap();
    }
    fs::write(
        temp.path().join("schema.json"),
        r#"{"version": 0, "indexes": []}"#,
    )
    .unwrap();

    let store = FsPreviewStore::new(temp.path());
    assert!(store.get("a.thr").await.unwrap().is_none());
    assert!(store.scan_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn entries_are_stored_in_the_documented_shape() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("clear/sweep.thr", 8, 42)).await.unwrap();

    let raw = fs::read_to_string(store.entry_path("clear/sweep.thr")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["pattern"], "clear/sweep.thr");
    assert_eq!(json["size"], 6);
    assert_eq!(json["lastAccessed"], 42);
    assert_eq!(json["created"], 42);
    assert_eq!(json["data"]["image_data"], "QQQQQQQQ");
}

#[tokio::test]
async fn scan_all_orders_by_last_accessed() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("late.thr", 8, 300)).await.unwrap();
    store.put(&entry("early.thr", 8, 100)).await.unwrap();
    store.put(&entry("middle.thr", 8, 200)).await.unwrap();

    let ids: Vec<String> = store
        .scan_all()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.pattern_id)
        .collect();
    assert_eq!(ids, vec!["early.thr", "middle.thr", "late.thr"]);
}

#[tokio::test]
async fn scan_by_size_orders_largest_first() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("small.thr", 4, 1)).await.unwrap();
    store.put(&entry("large.thr", 400, 2)).await.unwrap();
    store.put(&entry("medium.thr", 40, 3)).await.unwrap();

    let sizes: Vec<u64> = store
        .scan_by_size()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.size_bytes)
        .collect();
    assert_eq!(sizes, vec![300, 30, 3]);
}

#[tokio::test]
async fn corrupt_entries_are_dropped_on_open() {
    let temp = TempDir::new().unwrap();
    {
        let store = FsPreviewStore::new(temp.path());
        store.put(&entry("good.thr", 8, 1)).await.unwrap();
    }

    let corrupt = temp.path().join("entries").join("garbage.json");
    fs::write(&corrupt, "{not json").unwrap();
    // Leftover temp files are ignored
    fs::write(temp.path().join("entries").join("x.json.7.tmp"), "partial").unwrap();

    let store = FsPreviewStore::new(temp.path());
    let entries = store.scan_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].pattern_id, "good.thr");
    assert!(!corrupt.exists());
}

#[tokio::test]
async fn corrupt_entry_does_not_hide_the_rest_of_a_batch() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FsPreviewStore::new(temp.path()));
    store.put(&entry("good.thr", 8, 1)).await.unwrap();
    store.put(&entry("bad.thr", 8, 1)).await.unwrap();
    let bad_path = store.entry_path("bad.thr");
    fs::write(&bad_path, "{not json").unwrap();

    let cache = CacheManager::new(store.clone(), CacheSettings::default());
    let found = cache
        .batch_get(&["good.thr".to_string(), "bad.thr".to_string()])
        .await;

    assert_eq!(found.len(), 1);
    assert!(found.contains_key("good.thr"));
    assert!(!bad_path.exists());
    let indexed: Vec<String> = store
        .scan_index()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.pattern_id)
        .collect();
    assert_eq!(indexed, vec!["good.thr"]);
}

#[tokio::test]
async fn reading_a_corrupt_entry_removes_it() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("bad.thr", 8, 1)).await.unwrap();
    let path = store.entry_path("bad.thr");
    fs::write(&path, "{\"pattern\": ").unwrap();

    assert!(store.get("bad.thr").await.unwrap().is_none());
    assert!(!path.exists());
    assert!(store.get("bad.thr").await.unwrap().is_none());
}

#[tokio::test]
async fn touch_skips_entries_that_are_gone() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("a.thr", 8, 1)).await.unwrap();

    assert!(store.touch("a.thr", 50).await.unwrap());
    assert_eq!(store.get("a.thr").await.unwrap().unwrap().last_accessed, 50);

    store.delete("a.thr").await.unwrap();
    assert!(!store.touch("a.thr", 60).await.unwrap());
    assert!(!store.entry_path("a.thr").exists());
}

#[tokio::test]
async fn index_tracks_mutations_without_reading_payloads() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("a.thr", 8, 10)).await.unwrap();
    store.put(&entry("b.thr", 40, 20)).await.unwrap();
    store.put(&entry("c.thr", 4, 30)).await.unwrap();
    store.touch("a.thr", 40).await.unwrap();
    store.delete("c.thr").await.unwrap();

    // Payload damage goes unnoticed by index scans
    fs::write(store.entry_path("b.thr"), "{not json").unwrap();
    let rows = store.scan_index().await.unwrap();
    let order: Vec<(&str, u64, i64)> = rows
        .iter()
        .map(|m| (m.pattern_id.as_str(), m.size_bytes, m.last_accessed))
        .collect();
    assert_eq!(order, vec![("b.thr", 30, 20), ("a.thr", 6, 40)]);
    assert!(store.entry_path("b.thr").exists());
}

#[tokio::test]
async fn index_is_rebuilt_on_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let store = FsPreviewStore::new(temp.path());
        store.put(&entry("a.thr", 8, 10)).await.unwrap();
        store.put(&entry("b.thr", 8, 5)).await.unwrap();
    }

    let store = FsPreviewStore::new(temp.path());
    let ids: Vec<String> = store
        .scan_index()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.pattern_id)
        .collect();
    assert_eq!(ids, vec!["b.thr", "a.thr"]);
}

#[tokio::test]
async fn get_many_returns_only_present_ids() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("a.thr", 8, 1)).await.unwrap();
    store.put(&entry("b.thr", 8, 1)).await.unwrap();

    let ids = vec!["a.thr".to_string(), "missing.thr".to_string(), "b.thr".to_string()];
    let found = store.get_many(&ids).await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.contains_key("a.thr"));
    assert!(!found.contains_key("missing.thr"));
}

#[tokio::test]
async fn delete_and_clear() {
    let temp = TempDir::new().unwrap();
    let store = FsPreviewStore::new(temp.path());
    store.put(&entry("a.thr", 8, 1)).await.unwrap();
    store.put(&entry("b.thr", 8, 1)).await.unwrap();

    store.delete("a.thr").await.unwrap();
    // Deleting an absent entry is not an error
    store.delete("a.thr").await.unwrap();
    assert!(store.get("a.thr").await.unwrap().is_none());

    store.clear().await.unwrap();
    assert!(store.scan_all().await.unwrap().is_empty());
    // Still usable after clearing
    store.put(&entry("c.thr", 8, 1)).await.unwrap();
    assert!(store.get("c.thr").await.unwrap().is_some());
}

#[tokio::test]
async fn unwritable_root_degrades_gracefully() {
    let temp = TempDir::new().unwrap();
    // A regular file where the store directory should be
    let blocker = temp.path().join("previews");
    fs::write(&blocker, "not a directory").unwrap();

    let cache = CacheManager::new(Arc::new(FsPreviewStore::new(&blocker)), CacheSettings::default());
    assert!(!cache.open().await);
    assert!(cache.put("a.thr", PreviewRecord::new("AAAA", None, None)).await);
    assert!(cache.get("a.thr").await.is_some());
    assert!(!cache.stats().await.available);
}
