//! Network collaborators the fetch layer drives.
//!
//! Both are traits so the coordinator and bulk job can run against the HTTP
//! client in production and against recording fakes in tests.

use std::collections::HashMap;

use async_trait::async_trait;

use super::FetchError;
use crate::preview::{PatternMetadata, PreviewRecord};

/// Recommended upper bound on ids per preview request.
pub const MAX_BATCH_SIZE: usize = 10;

/// Lists every known pattern.
#[async_trait]
pub trait PatternCatalog: Send + Sync {
    /// Full catalog, in listing order. `path` is the pattern id.
    async fn list_patterns(&self) -> Result<Vec<PatternMetadata>, FetchError>;
}

/// Generates previews for a batch of patterns.
#[async_trait]
pub trait PreviewSource: Send + Sync {
    /// Fetch previews for `pattern_ids`.
    ///
    /// The returned map may omit ids or contain records with `error` set;
    /// callers decide what is cacheable.
    async fn fetch_batch(
        &self,
        pattern_ids: &[String],
    ) -> Result<HashMap<String, PreviewRecord>, FetchError>;
}
