//! Persistent tier contract and a non-durable backend.
//!
//! Backends report failures through [`StoreError`]; `CacheManager` is the
//! boundary that turns every one of them into a miss or a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::preview::{CacheEntry, EntryMeta};

/// Errors from persistent store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable keyed storage of preview entries.
///
/// Entries are keyed by pattern id. `scan_all` and `scan_index` yield
/// entries in `lastAccessed` index order (oldest first); `scan_index` never
/// loads payloads and is what eviction and statistics run on.
#[async_trait]
pub trait PreviewStore: Send + Sync {
    /// Human-readable backend name for logging.
    fn name(&self) -> &'static str;

    /// Prepare the backend. Idempotent; other operations call it lazily.
    async fn open(&self) -> StoreResult<()>;

    async fn get(&self, pattern_id: &str) -> StoreResult<Option<CacheEntry>>;

    /// Fetch several entries in one pass. Missing ids are absent from the map.
    async fn get_many(&self, pattern_ids: &[String]) -> StoreResult<HashMap<String, CacheEntry>> {
        let mut found = HashMap::new();
        for id in pattern_ids {
            if let Some(entry) = self.get(id).await? {
                found.insert(id.clone(), entry);
            }
        }
        Ok(found)
    }

    /// Insert or replace the entry for `entry.pattern_id`.
    async fn put(&self, entry: &CacheEntry) -> StoreResult<()>;

    /// Set `lastAccessed` on an entry that still exists.
    ///
    /// Returns false, writing nothing, when the entry is gone (invalidated or
    /// evicted since it was read).
    async fn touch(&self, pattern_id: &str, last_accessed: i64) -> StoreResult<bool>;

    /// Remove an entry. Removing a missing id is not an error.
    async fn delete(&self, pattern_id: &str) -> StoreResult<()>;

    /// All entries, oldest `lastAccessed` first.
    async fn scan_all(&self) -> StoreResult<Vec<CacheEntry>>;

    /// Metadata of all entries, oldest `lastAccessed` first.
    async fn scan_index(&self) -> StoreResult<Vec<EntryMeta>>;

    /// Metadata of all entries, largest first. Diagnostics only.
    async fn scan_by_size(&self) -> StoreResult<Vec<EntryMeta>> {
        let mut entries = self.scan_index().await?;
        entries.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        Ok(entries)
    }

    async fn clear(&self) -> StoreResult<()>;
}

/// Order entries the way the `lastAccessed` index yields them.
pub(crate) fn sort_by_access_index(entries: &mut [CacheEntry]) {
    entries.sort_by(|a, b| {
        (a.last_accessed, a.created, &a.pattern_id).cmp(&(b.last_accessed, b.created, &b.pattern_id))
    });
}

/// [`sort_by_access_index`] for index rows.
pub(crate) fn sort_meta_by_access(entries: &mut [EntryMeta]) {
    entries.sort_by(|a, b| {
        (a.last_accessed, a.created, &a.pattern_id).cmp(&(b.last_accessed, b.created, &b.pattern_id))
    });
}

/// Process-local store with the same contract as the durable backend.
///
/// Used for network-only sessions and tests. `set_unavailable(true)` makes
/// every operation fail the way an unreachable backend would.
#[derive(Debug, Default)]
pub struct MemoryPreviewStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    unavailable: AtomicBool,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PreviewStore for MemoryPreviewStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self) -> StoreResult<()> {
        self.check()
    }

    async fn get(&self, pattern_id: &str) -> StoreResult<Option<CacheEntry>> {
        self.check()?;
        Ok(self.entries.lock().get(pattern_id).cloned())
    }

    async fn get_many(&self, pattern_ids: &[String]) -> StoreResult<HashMap<String, CacheEntry>> {
        self.check()?;
        let entries = self.entries.lock();
        Ok(pattern_ids
            .iter()
            .filter_map(|id| entries.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }

    async fn put(&self, entry: &CacheEntry) -> StoreResult<()> {
        self.check()?;
        self.entries
            .lock()
            .insert(entry.pattern_id.clone(), entry.clone());
        Ok(())
    }

    async fn touch(&self, pattern_id: &str, last_accessed: i64) -> StoreResult<bool> {
        self.check()?;
        match self.entries.lock().get_mut(pattern_id) {
            Some(entry) => {
                entry.last_accessed = last_accessed;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, pattern_id: &str) -> StoreResult<()> {
        self.check()?;
        self.entries.lock().remove(pattern_id);
        Ok(())
    }

    async fn scan_all(&self) -> StoreResult<Vec<CacheEntry>> {
        self.check()?;
        let mut entries: Vec<CacheEntry> = self.entries.lock().values().cloned().collect();
        sort_by_access_index(&mut entries);
        Ok(entries)
    }

    async fn scan_index(&self) -> StoreResult<Vec<EntryMeta>> {
        self.check()?;
        let mut entries: Vec<EntryMeta> = self.entries.lock().values().map(CacheEntry::meta).collect();
        sort_meta_by_access(&mut entries);
        Ok(entries)
    }

    async fn clear(&self) -> StoreResult<()> {
        self.check()?;
        self.entries.lock().clear();
        Ok(())
    }
}
