//! Request coalescing in front of the preview generator.
//!
//! Callers fire `request(id)` whenever a pattern needs a preview (e.g. it
//! scrolled into view). Ids collect in a pending set; every new id re-arms a
//! single debounce timer. When the timer fires, the pending set is drained
//! and cleared in one step and a fetch session is spawned for the drained
//! ids. Ids requested while that session runs start a fresh window.
//!
//! Sessions run independently of each other; each owns a [`CancelToken`]
//! that `cancel()` trips.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::cancel::CancelToken;
use super::chunked::ChunkedFetch;
use super::source::PreviewSource;
use super::FetchSettings;
use crate::cache::CacheManager;

/// Coalesces individual preview requests into batched, chunked fetches.
///
/// Must be used from within a Tokio runtime: `request` spawns the debounce
/// timer and fetch sessions as tasks. Dropping the coordinator cancels any
/// running session and discards pending ids.
pub struct BatchFetchCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    cache: Arc<CacheManager>,
    source: Arc<dyn PreviewSource>,
    settings: FetchSettings,
    state: Mutex<State>,
    /// Signalled whenever the coordinator may have become idle
    idle: Notify,
}

#[derive(Default)]
struct State {
    /// Ids waiting for the current window, in arrival order
    pending: Vec<String>,
    pending_set: HashSet<String>,
    /// Armed debounce timer
    timer: Option<JoinHandle<()>>,
    /// Incremented on every re-arm; a timer only fires for its own generation
    timer_generation: u64,
    /// Running fetch sessions
    sessions: HashMap<u64, CancelToken>,
    next_session: u64,
}

impl State {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.timer.is_none() && self.sessions.is_empty()
    }
}

impl BatchFetchCoordinator {
    pub fn new(
        cache: Arc<CacheManager>,
        source: Arc<dyn PreviewSource>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                source,
                settings,
                state: Mutex::new(State::default()),
                idle: Notify::new(),
            }),
        }
    }

    /// Ask for `pattern_id`'s preview to be cached (non-blocking).
    ///
    /// Skips ids already in the memory tier or already pending. Otherwise the
    /// id joins the pending set and the debounce timer restarts.
    pub fn request(&self, pattern_id: &str) {
        if self.inner.cache.contains_in_memory(pattern_id) {
            return;
        }

        let mut state = self.inner.state.lock();
        if state.pending_set.contains(pattern_id) {
            return;
        }
        state.pending_set.insert(pattern_id.to_string());
        state.pending.push(pattern_id.to_string());

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.timer_generation += 1;
        let generation = state.timer_generation;
        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.settings.coalesce_window).await;
            Inner::fire(inner, generation);
        }));
    }

    /// Request several ids at once.
    pub fn prefetch(&self, pattern_ids: &[String]) {
        for id in pattern_ids {
            self.request(id);
        }
    }

    /// Check if an id is waiting for the current window
    pub fn is_pending(&self, pattern_id: &str) -> bool {
        self.inner.state.lock().pending_set.contains(pattern_id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.state.lock().sessions.len()
    }

    /// Cancel every running fetch session.
    ///
    /// Chunks already written stay cached. Pending ids are unaffected and
    /// will still be fetched when their window closes.
    pub fn cancel(&self) {
        let state = self.inner.state.lock();
        for token in state.sessions.values() {
            token.cancel();
        }
        if !state.sessions.is_empty() {
            info!(sessions = state.sessions.len(), "Cancelling preview fetch sessions");
        }
    }

    /// Stop everything: disarm the timer, drop pending ids, cancel sessions.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.pending.clear();
            state.pending_set.clear();
            for token in state.sessions.values() {
                token.cancel();
            }
        }
        self.inner.idle.notify_waiters();
    }

    /// Wait until nothing is pending and no session is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for BatchFetchCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    /// Debounce timer expiry: drain the pending set and start a session.
    fn fire(inner: Arc<Self>, generation: u64) {
        let session = {
            let mut state = inner.state.lock();
            if state.timer_generation != generation {
                return;
            }
            state.timer = None;

            if state.pending.is_empty() {
                None
            } else {
                let ids = std::mem::take(&mut state.pending);
                state.pending_set.clear();
                let id = state.next_session;
                state.next_session += 1;
                let token = CancelToken::new();
                state.sessions.insert(id, token.clone());
                Some((id, ids, token))
            }
        };

        match session {
            Some((id, ids, token)) => {
                debug!(session = id, count = ids.len(), "Coalescing window closed");
                let runner = Arc::clone(&inner);
                tokio::spawn(async move {
                    runner.run_session(id, ids, token).await;
                });
            }
            None => inner.idle.notify_waiters(),
        }
    }

    async fn run_session(&self, session: u64, ids: Vec<String>, cancel: CancelToken) {
        let cached = self.cache.batch_get(&ids).await;
        let to_fetch: Vec<String> = ids
            .into_iter()
            .filter(|id| !cached.contains_key(id))
            .collect();

        if !to_fetch.is_empty() {
            let summary = ChunkedFetch::new(&self.cache, self.source.as_ref(), &self.settings)
                .run(&to_fetch, &cancel, |_| {})
                .await;
            debug!(
                session,
                requested = to_fetch.len(),
                stored = summary.stored,
                failed_chunks = summary.chunks_failed,
                cancelled = summary.cancelled,
                "Fetch session finished"
            );
        }

        self.state.lock().sessions.remove(&session);
        self.idle.notify_waiters();
    }
}
