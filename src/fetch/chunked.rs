//! Sequential chunked fetching shared by the coordinator and the bulk job.
//!
//! Ids are split into fixed-size chunks. Each chunk is one network call;
//! the next chunk starts only after the previous call resolved and the
//! inter-chunk delay elapsed. Valid results are written to the cache as each
//! chunk lands. A failed chunk is logged and skipped; cancellation stops the
//! loop at the next boundary and aborts the in-flight call.

use tracing::{debug, warn};

use super::cancel::CancelToken;
use super::source::PreviewSource;
use super::FetchSettings;
use crate::cache::CacheManager;

/// Outcome of one processed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    /// Zero-based chunk index
    pub index: usize,
    pub chunk_count: usize,
    /// Ids sent in this chunk
    pub requested: usize,
    /// Ids from this chunk accepted by the cache
    pub stored: usize,
    /// True when the network call failed
    pub failed: bool,
    /// Ids processed so far, this chunk included
    pub completed: usize,
    pub total: usize,
}

impl ChunkReport {
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.chunk_count
    }
}

/// Totals for a whole chunked run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub chunks_run: usize,
    pub chunks_failed: usize,
    /// Ids in chunks that ran to completion (successfully or not)
    pub processed: usize,
    pub stored: usize,
    /// True when the run stopped early because of cancellation
    pub cancelled: bool,
}

/// Drives chunk-by-chunk fetches into a [`CacheManager`].
pub struct ChunkedFetch<'a> {
    cache: &'a CacheManager,
    source: &'a dyn PreviewSource,
    settings: &'a FetchSettings,
}

impl<'a> ChunkedFetch<'a> {
    pub fn new(
        cache: &'a CacheManager,
        source: &'a dyn PreviewSource,
        settings: &'a FetchSettings,
    ) -> Self {
        Self {
            cache,
            source,
            settings,
        }
    }

    /// Fetch `ids` chunk by chunk, calling `on_chunk` after each one.
    pub async fn run<F>(&self, ids: &[String], cancel: &CancelToken, mut on_chunk: F) -> FetchSummary
    where
        F: FnMut(&ChunkReport),
    {
        let mut summary = FetchSummary::default();
        if ids.is_empty() {
            return summary;
        }

        let chunk_size = self.settings.chunk_size.max(1);
        let chunk_count = ids.len().div_ceil(chunk_size);

        for (index, chunk) in ids.chunks(chunk_size).enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.source.fetch_batch(chunk) => Some(result),
            };

            let mut report = ChunkReport {
                index,
                chunk_count,
                requested: chunk.len(),
                stored: 0,
                failed: false,
                completed: 0,
                total: ids.len(),
            };

            match response {
                None => {
                    debug!(chunk = index, "Chunk fetch aborted");
                    summary.cancelled = true;
                    break;
                }
                Some(Ok(mut previews)) => {
                    for id in chunk {
                        match previews.remove(id) {
                            Some(record) => {
                                if self.cache.put(id, record).await {
                                    report.stored += 1;
                                }
                            }
                            None => debug!(pattern = %id, "No preview returned"),
                        }
                    }
                    if !previews.is_empty() {
                        debug!(extra = previews.len(), "Ignoring previews that were not requested");
                    }
                }
                Some(Err(e)) => {
                    warn!(
                        chunk = index,
                        size = chunk.len(),
                        transient = e.is_transient(),
                        error = %e,
                        "Preview chunk failed"
                    );
                    report.failed = true;
                    summary.chunks_failed += 1;
                }
            }

            summary.chunks_run += 1;
            summary.processed += chunk.len();
            summary.stored += report.stored;
            report.completed = summary.processed;
            on_chunk(&report);

            if !report.is_last() && !self.settings.chunk_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.settings.chunk_delay) => {}
                }
            }
        }

        if summary.cancelled {
            debug!(processed = summary.processed, total = ids.len(), "Chunked fetch cancelled");
        }
        summary
    }
}
