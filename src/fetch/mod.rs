//! Getting previews from the network into the cache.
//!
//! - [`coordinator`] - coalesces scattered requests into debounced batches
//! - [`bulk`] - one-shot "cache everything" job with progress reporting
//! - [`chunked`] - the sequential chunk loop both of them drive
//! - [`source`] - collaborator traits (catalog listing, preview generation)
//! - [`cancel`] - cooperative cancellation token

pub mod bulk;
pub mod cancel;
pub mod chunked;
pub mod coordinator;
mod error;
pub mod source;

pub use bulk::{BulkCacheJob, BulkOutcome, BulkProgress, JobState};
pub use cancel::CancelToken;
pub use chunked::{ChunkReport, ChunkedFetch, FetchSummary};
pub use coordinator::BatchFetchCoordinator;
pub use error::{FetchError, JobError};
pub use source::{PatternCatalog, PreviewSource, MAX_BATCH_SIZE};

use std::time::Duration;

/// Default number of ids per network call.
pub const DEFAULT_CHUNK_SIZE: usize = MAX_BATCH_SIZE;

/// Default pause between consecutive chunks.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Default quiet period before coalesced requests are fetched.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(50);

/// Runtime knobs for batching and pacing network fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    pub coalesce_window: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            coalesce_window: DEFAULT_COALESCE_WINDOW,
        }
    }
}
