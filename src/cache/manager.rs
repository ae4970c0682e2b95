//! Two-tier preview cache: the only component that mutates either tier.
//!
//! The persistent store is the source of truth. The memory tier is a
//! same-session speed-up that may drop entries the store still holds (or,
//! after a failed store write, hold entries the store lost); neither case
//! affects correctness, so the tiers are never synchronized explicitly.
//!
//! Storage failures never escape this type: they are logged and reported to
//! callers as misses or no-ops.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::memory::MemoryCache;
use super::store::PreviewStore;
use super::{CacheSettings, CacheStats};
use crate::preview::{CacheEntry, EntryMeta, PreviewRecord};

/// Owner of both cache tiers and the byte-budget eviction policy.
pub struct CacheManager {
    memory: Mutex<MemoryCache<String, Arc<PreviewRecord>>>,
    store: Arc<dyn PreviewStore>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
}

impl CacheManager {
    /// Create a manager over `store` using the wall clock.
    pub fn new(store: Arc<dyn PreviewStore>, settings: CacheSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit time source.
    pub fn with_clock(
        store: Arc<dyn PreviewStore>,
        settings: CacheSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            memory: Mutex::new(MemoryCache::new(settings.memory_capacity)),
            store,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Open the persistent tier ahead of first use.
    ///
    /// Returns false when the store is unavailable; the cache keeps working
    /// from memory and the network in that case.
    pub async fn open(&self) -> bool {
        match self.store.open().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = self.store.name(), error = %e, "Preview store unavailable, continuing without persistence");
                false
            }
        }
    }

    /// Synchronous memory-tier probe.
    pub fn contains_in_memory(&self, pattern_id: &str) -> bool {
        self.memory.lock().contains(pattern_id)
    }

    /// Number of entries currently held in memory.
    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    /// Look up a preview.
    ///
    /// A memory hit returns immediately. A persistent hit is promoted into
    /// memory and has its `lastAccessed` refreshed. If the entry was
    /// invalidated or evicted while being read, the record read is still
    /// returned but nothing is written back to either tier. `None` means the
    /// caller must obtain the preview elsewhere and `put` it.
    pub async fn get(&self, pattern_id: &str) -> Option<Arc<PreviewRecord>> {
        if let Some(record) = self.memory.lock().get(pattern_id) {
            return Some(Arc::clone(record));
        }

        let entry = match self.store.get(pattern_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(pattern = pattern_id, error = %e, "Preview store read failed");
                return None;
            }
        };

        let record = Arc::new(entry.record);
        self.memory
            .lock()
            .set(pattern_id.to_string(), Arc::clone(&record));

        // Only refresh an entry that still exists; a concurrent removal wins
        match self.store.touch(pattern_id, self.clock.now_ms()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(pattern = pattern_id, "Preview removed while being read");
                self.memory.lock().remove(pattern_id);
            }
            Err(e) => {
                warn!(pattern = pattern_id, error = %e, "Failed to refresh lastAccessed");
            }
        }

        Some(record)
    }

    /// Look up many previews with a single persistent-tier pass.
    ///
    /// Memory hits are served synchronously; the remainder goes to the store
    /// in one `get_many`. This is an existence check for bulk workflows, so
    /// it neither promotes entries into memory nor refreshes `lastAccessed`.
    pub async fn batch_get(&self, pattern_ids: &[String]) -> HashMap<String, Arc<PreviewRecord>> {
        let mut found = HashMap::new();
        let mut remaining = Vec::new();

        {
            let memory = self.memory.lock();
            for id in pattern_ids {
                if found.contains_key(id) {
                    continue;
                }
                match memory.get(id.as_str()) {
                    Some(record) => {
                        found.insert(id.clone(), Arc::clone(record));
                    }
                    None => remaining.push(id.clone()),
                }
            }
        }

        remaining.sort();
        remaining.dedup();
        if remaining.is_empty() {
            return found;
        }

        match self.store.get_many(&remaining).await {
            Ok(entries) => {
                for (id, entry) in entries {
                    found.insert(id, Arc::new(entry.record));
                }
            }
            Err(e) => {
                warn!(count = remaining.len(), error = %e, "Preview store batch read failed");
            }
        }

        found
    }

    /// Store a preview in both tiers.
    ///
    /// Records without image data or carrying a generator error are
    /// discarded. Before writing, the eviction sweep reclaims whatever the new
    /// entry would push past the byte budget plus a 10% headroom. Returns true
    /// if the record was accepted.
    pub async fn put(&self, pattern_id: &str, record: PreviewRecord) -> bool {
        if record.is_error() {
            debug!(pattern = pattern_id, error = ?record.error, "Discarding failed preview");
            return false;
        }
        if record.image_data.is_empty() {
            warn!(pattern = pattern_id, "Discarding preview with empty image data");
            return false;
        }

        let now = self.clock.now_ms();
        let mut entry = CacheEntry::new(pattern_id, record, now);

        let existing = match self.store.scan_index().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Preview store scan failed, skipping eviction");
                Vec::new()
            }
        };

        // The entry being replaced neither counts toward the total nor competes for eviction
        let (previous, others): (Vec<EntryMeta>, Vec<EntryMeta>) = existing
            .into_iter()
            .partition(|e| e.pattern_id == pattern_id);
        if let Some(previous) = previous.first() {
            entry.created = previous.created;
        }

        let current_total: u64 = others.iter().map(|e| e.size_bytes).sum();
        let capacity = self.settings.max_bytes;
        let overflow = (current_total + entry.size_bytes).saturating_sub(capacity);
        if overflow > 0 {
            let target = overflow + capacity / 10;
            self.evict(others, target).await;
        }

        self.memory
            .lock()
            .set(pattern_id.to_string(), Arc::new(entry.record.clone()));

        if let Err(e) = self.store.put(&entry).await {
            warn!(pattern = pattern_id, error = %e, "Preview store write failed");
        }
        true
    }

    /// Remove a pattern from both tiers, e.g. after it changed upstream.
    pub async fn invalidate(&self, pattern_id: &str) {
        self.memory.lock().remove(pattern_id);
        if let Err(e) = self.store.delete(pattern_id).await {
            warn!(pattern = pattern_id, error = %e, "Failed to delete preview");
        }
    }

    /// Drop every cached preview.
    pub async fn clear(&self) {
        self.memory.lock().clear();
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear preview store");
        }
    }

    /// Snapshot of both tiers.
    pub async fn stats(&self) -> CacheStats {
        let (memory_entries, memory_capacity) = {
            let memory = self.memory.lock();
            (memory.len(), memory.capacity())
        };

        let mut stats = CacheStats {
            backend: self.store.name(),
            available: true,
            entry_count: 0,
            total_bytes: 0,
            max_bytes: self.settings.max_bytes,
            memory_entries,
            memory_capacity,
            oldest_access: None,
            newest_access: None,
            largest: None,
        };

        match self.store.scan_by_size().await {
            Ok(entries) => {
                stats.entry_count = entries.len();
                stats.total_bytes = entries.iter().map(|e| e.size_bytes).sum();
                stats.oldest_access = entries.iter().map(|e| e.last_accessed).min();
                stats.newest_access = entries.iter().map(|e| e.last_accessed).max();
                stats.largest = entries
                    .first()
                    .map(|e| (e.pattern_id.clone(), e.size_bytes));
            }
            Err(e) => {
                warn!(error = %e, "Preview store scan failed");
                stats.available = false;
            }
        }

        stats
    }

    /// Delete least-recently-accessed entries until `target` bytes are freed.
    ///
    /// Candidates are ordered oldest `lastAccessed` first; ties keep the
    /// store's scan order. Running out of candidates short of the target is
    /// not an error. Returns the bytes actually freed.
    async fn evict(&self, mut candidates: Vec<EntryMeta>, target: u64) -> u64 {
        candidates.sort_by_key(|e| e.last_accessed);

        let mut freed = 0u64;
        let mut removed = 0usize;
        for entry in candidates {
            if freed >= target {
                break;
            }
            self.memory.lock().remove(entry.pattern_id.as_str());
            match self.store.delete(&entry.pattern_id).await {
                Ok(()) => {
                    freed += entry.size_bytes;
                    removed += 1;
                }
                Err(e) => {
                    warn!(pattern = %entry.pattern_id, error = %e, "Failed to evict preview");
                }
            }
        }

        info!(removed, freed, target, "Evicted previews");
        freed
    }
}
