//! One-shot "cache every pattern" job.
//!
//! Lists the full catalog, works out which patterns are not cached yet and
//! fetches those in chunks, reporting progress after every chunk. The job
//! moves `Idle -> Enumerating -> Fetching -> Done` (or `Failed`) exactly once.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::cancel::CancelToken;
use super::chunked::ChunkedFetch;
use super::source::{PatternCatalog, PreviewSource};
use super::{FetchSettings, JobError};
use crate::cache::CacheManager;

/// Lifecycle of a [`BulkCacheJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Enumerating,
    Fetching,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Idle => "idle",
            JobState::Enumerating => "enumerating",
            JobState::Fetching => "fetching",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Progress snapshot passed to the job's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkProgress {
    /// Uncached ids processed so far (or the catalog size when nothing was missing)
    pub completed: usize,
    pub total: usize,
    /// Set only on the final report
    pub done: bool,
}

impl BulkProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Result of a bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutcome {
    pub success: bool,
    /// Number of ids the job attempted (not the number actually stored)
    pub cached: usize,
}

impl BulkOutcome {
    pub fn failed() -> Self {
        Self {
            success: false,
            cached: 0,
        }
    }
}

/// Caches every pattern in the catalog that is not cached yet.
pub struct BulkCacheJob {
    cache: Arc<CacheManager>,
    catalog: Arc<dyn PatternCatalog>,
    source: Arc<dyn PreviewSource>,
    settings: FetchSettings,
    state: Arc<Mutex<JobState>>,
    cancel: CancelToken,
}

impl BulkCacheJob {
    pub fn new(
        cache: Arc<CacheManager>,
        catalog: Arc<dyn PatternCatalog>,
        source: Arc<dyn PreviewSource>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            cache,
            catalog,
            source,
            settings,
            state: Arc::new(Mutex::new(JobState::Idle)),
            cancel: CancelToken::new(),
        }
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    /// Token that stops the job at the next chunk boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the job to completion.
    ///
    /// Never returns an error: catalog failures, panics inside the run and a
    /// second invocation all yield `BulkOutcome { success: false, cached: 0 }`.
    /// Cancellation is a success whose `cached` counts the ids in chunks that
    /// finished before the stop. Every run that gets past the catalog ends
    /// with exactly one `done` progress report, cancelled runs included.
    pub async fn run<F>(&self, on_progress: F) -> BulkOutcome
    where
        F: FnMut(BulkProgress) + Send + 'static,
    {
        {
            let mut state = self.state.lock();
            if *state != JobState::Idle {
                warn!(state = %*state, error = %JobError::AlreadyRan, "Refusing to rerun bulk cache job");
                return BulkOutcome::failed();
            }
            *state = JobState::Enumerating;
        }

        let task = tokio::spawn(execute(
            Arc::clone(&self.cache),
            Arc::clone(&self.catalog),
            Arc::clone(&self.source),
            self.settings,
            Arc::clone(&self.state),
            self.cancel.clone(),
            on_progress,
        ));

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(JobError::Panicked(e.to_string())),
        };

        match result {
            Ok(cached) => {
                *self.state.lock() = JobState::Done;
                info!(cached, "Bulk cache job finished");
                BulkOutcome {
                    success: true,
                    cached,
                }
            }
            Err(e) => {
                *self.state.lock() = JobState::Failed;
                error!(error = %e, "Bulk cache job failed");
                BulkOutcome::failed()
            }
        }
    }
}

async fn execute<F>(
    cache: Arc<CacheManager>,
    catalog: Arc<dyn PatternCatalog>,
    source: Arc<dyn PreviewSource>,
    settings: FetchSettings,
    state: Arc<Mutex<JobState>>,
    cancel: CancelToken,
    mut on_progress: F,
) -> Result<usize, JobError>
where
    F: FnMut(BulkProgress) + Send + 'static,
{
    let patterns = catalog.list_patterns().await.map_err(JobError::Catalog)?;

    let mut seen = HashSet::with_capacity(patterns.len());
    let ids: Vec<String> = patterns
        .into_iter()
        .map(|p| p.path)
        .filter(|path| seen.insert(path.clone()))
        .collect();
    let total = ids.len();

    let cached = cache.batch_get(&ids).await;
    let uncached: Vec<String> = ids
        .into_iter()
        .filter(|id| !cached.contains_key(id))
        .collect();

    info!(
        total,
        already_cached = cached.len(),
        to_fetch = uncached.len(),
        "Bulk cache job enumerated catalog"
    );

    if uncached.is_empty() {
        on_progress(BulkProgress {
            completed: total,
            total,
            done: true,
        });
        return Ok(0);
    }

    *state.lock() = JobState::Fetching;

    let summary = ChunkedFetch::new(&cache, source.as_ref(), &settings)
        .run(&uncached, &cancel, |report| {
            on_progress(BulkProgress {
                completed: report.completed,
                total: report.total,
                done: report.is_last(),
            })
        })
        .await;

    if summary.cancelled {
        info!(
            processed = summary.processed,
            total = uncached.len(),
            "Bulk cache job cancelled"
        );
        // The chunk loop stopped short of its last report
        on_progress(BulkProgress {
            completed: summary.processed,
            total: uncached.len(),
            done: true,
        });
        return Ok(summary.processed);
    }
    if summary.chunks_failed > 0 {
        warn!(
            failed_chunks = summary.chunks_failed,
            "Some preview chunks failed during bulk caching"
        );
    }

    Ok(uncached.len())
}
