//! Pattern Preview Cache (ppc) Library
//!
//! A two-tier cache (bounded in-memory FIFO plus a byte-budgeted persistent
//! store with LRU eviction) for pattern preview images, and the fetch layer
//! that fills it from a remote preview generator.

pub mod cache;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod http;
pub mod preview;

pub use cache::{CacheManager, CacheSettings, CacheStats, FsPreviewStore, MemoryPreviewStore};
pub use config::Config;
pub use fetch::{BatchFetchCoordinator, BulkCacheJob, BulkOutcome, BulkProgress, FetchSettings};
pub use http::HttpPreviewClient;
pub use preview::{CacheEntry, EntryMeta, PatternMetadata, Point, PreviewRecord};
