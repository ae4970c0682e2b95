//! Filesystem-backed persistent tier.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/schema.json            {"version": 1}
//! <root>/entries/<sha256>.json  one CacheEntry per pattern
//! ```
//!
//! File names are the SHA-256 of the pattern id, so arbitrary catalog paths
//! map to flat, filesystem-safe names. Writes go through a temp file and a
//! rename so a crash never leaves a half-written entry behind.
//!
//! The `lastAccessed` and size orderings come from an in-process index of
//! [`EntryMeta`] rows, built once when the store opens and kept current by
//! every mutation. Scans never read payloads. One process is expected to
//! own a store directory at a time; reads still go to disk and resync the
//! index for the ids they touch.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use super::store::{sort_by_access_index, sort_meta_by_access, PreviewStore, StoreError, StoreResult};
use crate::preview::{CacheEntry, EntryMeta};

/// Version of the on-disk layout. A mismatch resets the entries directory.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_FILE: &str = "schema.json";
const ENTRIES_DIR: &str = "entries";

/// Marker written by `open()` describing the layout.
#[derive(Debug, Serialize, Deserialize)]
struct SchemaMarker {
    version: u32,
}

/// Index rows keyed by pattern id.
type Index = HashMap<String, EntryMeta>;

/// Durable preview store rooted at a directory.
#[derive(Debug)]
pub struct FsPreviewStore {
    root: PathBuf,
    /// Loaded on open; locked across each file operation so disk and index
    /// change together
    index: OnceCell<Mutex<Index>>,
    tmp_counter: AtomicU64,
}

impl FsPreviewStore {
    /// Create a store rooted at `root`. Nothing touches the disk until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: OnceCell::new(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entries_dir(&self) -> PathBuf {
        self.root.join(ENTRIES_DIR)
    }

    /// Path of the file holding `pattern_id`'s entry.
    pub fn entry_path(&self, pattern_id: &str) -> PathBuf {
        self.entries_dir().join(entry_file_name(pattern_id))
    }

    /// Open the store on first use and hand back its index.
    async fn index(&self) -> StoreResult<&Mutex<Index>> {
        self.index
            .get_or_try_init(|| async {
                self.create_schema().await?;
                let index = self.load_index().await?;
                debug!(root = %self.root.display(), entries = index.len(), "Opened preview store");
                Ok::<_, StoreError>(Mutex::new(index))
            })
            .await
    }

    async fn create_schema(&self) -> StoreResult<()> {
        let entries_dir = self.entries_dir();
        fs::create_dir_all(&entries_dir)
            .await
            .map_err(|e| StoreError::io(format!("creating {}", entries_dir.display()), e))?;

        let schema_path = self.root.join(SCHEMA_FILE);
        match fs::read(&schema_path).await {
            Ok(bytes) => match serde_json::from_slice::<SchemaMarker>(&bytes) {
                Ok(marker) if marker.version == SCHEMA_VERSION => return Ok(()),
                Ok(marker) => {
                    warn!(
                        found = marker.version,
                        expected = SCHEMA_VERSION,
                        "Preview store schema changed, discarding cached entries"
                    );
                    self.reset_entries().await?;
                }
                Err(e) => {
                    warn!(error = %e, "Unreadable preview store schema, discarding cached entries");
                    self.reset_entries().await?;
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io("reading schema marker", e)),
        }

        let marker = SchemaMarker {
            version: SCHEMA_VERSION,
        };
        let bytes = serde_json::to_vec_pretty(&marker)?;
        self.write_atomic(&schema_path, &bytes).await?;
        debug!(root = %self.root.display(), "Created preview store schema");
        Ok(())
    }

    /// Build the index from the entry files, dropping any that are corrupt.
    async fn load_index(&self) -> StoreResult<Index> {
        let entries_dir = self.entries_dir();
        let mut dir = fs::read_dir(&entries_dir)
            .await
            .map_err(|e| StoreError::io(format!("listing {}", entries_dir.display()), e))?;

        let mut index = Index::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io("listing entries", e))?
        {
            let path = item.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(format!("reading {}", path.display()), e)),
            };
            match serde_json::from_slice::<EntryMeta>(&bytes) {
                Ok(meta)
                    if path.file_name().and_then(|n| n.to_str())
                        == Some(entry_file_name(&meta.pattern_id).as_str()) =>
                {
                    index.insert(meta.pattern_id.clone(), meta);
                }
                Ok(meta) => {
                    debug!(path = %path.display(), pattern = %meta.pattern_id, "Ignoring misnamed preview entry");
                }
                Err(e) => discard_corrupt(&path, &e).await,
            }
        }
        Ok(index)
    }

    async fn reset_entries(&self) -> StoreResult<()> {
        let entries_dir = self.entries_dir();
        match fs::remove_dir_all(&entries_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io("clearing entries", e)),
        }
        fs::create_dir_all(&entries_dir)
            .await
            .map_err(|e| StoreError::io(format!("creating {}", entries_dir.display()), e))
    }

    /// Write `bytes` to `path` via a uniquely named temp file and a rename.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", n));
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(format!("writing {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(format!("renaming into {}", path.display()), e));
        }
        Ok(())
    }

    async fn write_entry(&self, index: &mut Index, entry: &CacheEntry) -> StoreResult<()> {
        let bytes = serde_json::to_vec(entry)?;
        self.write_atomic(&self.entry_path(&entry.pattern_id), &bytes)
            .await?;
        index.insert(entry.pattern_id.clone(), entry.meta());
        Ok(())
    }

    /// Read one entry and bring its index row in line with what is on disk.
    ///
    /// A corrupt file is deleted and reported as a miss; only I/O failures
    /// are errors.
    async fn read_entry(&self, index: &mut Index, pattern_id: &str) -> StoreResult<Option<CacheEntry>> {
        let path = self.entry_path(pattern_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                index.remove(pattern_id);
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(format!("reading {}", path.display()), e)),
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.pattern_id == pattern_id => {
                index.insert(entry.pattern_id.clone(), entry.meta());
                Ok(Some(entry))
            }
            Ok(_) => {
                index.remove(pattern_id);
                Ok(None)
            }
            Err(e) => {
                discard_corrupt(&path, &e).await;
                index.remove(pattern_id);
                Ok(None)
            }
        }
    }
}

/// Flat file name for a pattern id: hex SHA-256 plus `.json`.
fn entry_file_name(pattern_id: &str) -> String {
    let digest = Sha256::digest(pattern_id.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}.json", hex)
}

async fn discard_corrupt(path: &Path, error: &serde_json::Error) {
    warn!(path = %path.display(), error = %error, "Removing corrupt preview entry");
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove corrupt preview entry");
        }
    }
}

#[async_trait]
impl PreviewStore for FsPreviewStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn open(&self) -> StoreResult<()> {
        self.index().await.map(|_| ())
    }

    async fn get(&self, pattern_id: &str) -> StoreResult<Option<CacheEntry>> {
        let mut index = self.index().await?.lock().await;
        self.read_entry(&mut index, pattern_id).await
    }

    async fn get_many(&self, pattern_ids: &[String]) -> StoreResult<HashMap<String, CacheEntry>> {
        let mut index = self.index().await?.lock().await;
        let mut found = HashMap::new();
        for id in pattern_ids {
            if found.contains_key(id) {
                continue;
            }
            if let Some(entry) = self.read_entry(&mut index, id).await? {
                found.insert(id.clone(), entry);
            }
        }
        Ok(found)
    }

    async fn put(&self, entry: &CacheEntry) -> StoreResult<()> {
        let mut index = self.index().await?.lock().await;
        self.write_entry(&mut index, entry).await
    }

    async fn touch(&self, pattern_id: &str, last_accessed: i64) -> StoreResult<bool> {
        let mut index = self.index().await?.lock().await;
        match self.read_entry(&mut index, pattern_id).await? {
            Some(mut entry) => {
                entry.last_accessed = last_accessed;
                self.write_entry(&mut index, &entry).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, pattern_id: &str) -> StoreResult<()> {
        let mut index = self.index().await?.lock().await;
        let path = self.entry_path(pattern_id);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(format!("deleting {}", path.display()), e)),
        }
        index.remove(pattern_id);
        Ok(())
    }

    async fn scan_all(&self) -> StoreResult<Vec<CacheEntry>> {
        let mut index = self.index().await?.lock().await;
        let ids: Vec<String> = index.keys().cloned().collect();
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.read_entry(&mut index, &id).await? {
                entries.push(entry);
            }
        }
        sort_by_access_index(&mut entries);
        Ok(entries)
    }

    async fn scan_index(&self) -> StoreResult<Vec<EntryMeta>> {
        let index = self.index().await?.lock().await;
        let mut rows: Vec<EntryMeta> = index.values().cloned().collect();
        sort_meta_by_access(&mut rows);
        Ok(rows)
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut index = self.index().await?.lock().await;
        self.reset_entries().await?;
        index.clear();
        Ok(())
    }
}
