//! Two-tier preview cache.
//!
//! - [`memory`] - bounded FIFO in-process tier
//! - [`store`] - persistent tier contract plus a non-durable backend
//! - [`fs_store`] - durable filesystem backend
//! - [`manager`] - [`CacheManager`], the single mutation gateway
//! - [`clock`] - timestamp source for `lastAccessed` bookkeeping

pub mod clock;
pub mod fs_store;
pub mod manager;
pub mod memory;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fs_store::FsPreviewStore;
pub use manager::CacheManager;
pub use memory::{MemoryCache, DEFAULT_MEMORY_CAPACITY};
pub use store::{MemoryPreviewStore, PreviewStore, StoreError, StoreResult};

use chrono::{DateTime, Local, TimeZone};
use humansize::{format_size, BINARY};

/// Default persistent-tier byte budget (200 MB).
pub const DEFAULT_MAX_BYTES: u64 = 200 * 1024 * 1024;

/// Runtime limits for the two cache tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Byte budget of the persistent tier
    pub max_bytes: u64,
    /// Entry cap of the memory tier
    pub memory_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub backend: &'static str,
    /// False when the persistent tier could not be read
    pub available: bool,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub memory_entries: usize,
    pub memory_capacity: usize,
    pub oldest_access: Option<i64>,
    pub newest_access: Option<i64>,
    /// Largest persistent entry (pattern id, bytes)
    pub largest: Option<(String, u64)>,
}

impl CacheStats {
    /// Get human-readable total size
    pub fn size_human(&self) -> String {
        format_size(self.total_bytes, BINARY)
    }

    /// Share of the byte budget in use, in percent.
    pub fn usage_percent(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }
        (self.total_bytes as f64 / self.max_bytes as f64) * 100.0
    }

    /// Format a summary for display
    pub fn summary(&self) -> String {
        if !self.available {
            return format!(
                "Preview cache ({}): unavailable\n   Memory: {}/{} entries",
                self.backend, self.memory_entries, self.memory_capacity
            );
        }

        let mut summary = format!(
            "Preview cache ({}): {} of {} ({:.1}%)\n   Entries: {} stored, {}/{} in memory",
            self.backend,
            self.size_human(),
            format_size(self.max_bytes, BINARY),
            self.usage_percent(),
            self.entry_count,
            self.memory_entries,
            self.memory_capacity
        );

        if let Some(oldest) = self.oldest_access.and_then(format_timestamp) {
            summary.push_str(&format!("\n   Least recently used: {}", oldest));
        }
        if let Some((pattern, size)) = &self.largest {
            summary.push_str(&format!(
                "\n   Largest: {} ({})",
                pattern,
                format_size(*size, BINARY)
            ));
        }

        summary
    }
}

fn format_timestamp(ms: i64) -> Option<String> {
    let time: DateTime<Local> = Local.timestamp_millis_opt(ms).single()?;
    Some(time.format("%Y-%m-%d %H:%M").to_string())
}
