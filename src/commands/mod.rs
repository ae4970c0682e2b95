//! Command handlers for the ppc CLI.
//!
//! Each submodule handles a specific CLI command or command group.
//! The main dispatch logic remains in main.rs.

pub mod cache_all;
pub mod config;
pub mod get;
pub mod invalidate;
pub mod status;
pub mod warm;

use anyhow::{Context, Result};
use std::sync::Arc;

use ppc::{CacheManager, Config, FsPreviewStore, HttpPreviewClient};

/// Open the configured cache.
///
/// An unavailable store is logged by the manager and the command carries on
/// without persistence.
pub async fn open_cache(config: &Config) -> Arc<CacheManager> {
    let store = Arc::new(FsPreviewStore::new(config.cache_directory()));
    let cache = Arc::new(CacheManager::new(store, config.cache_settings()));
    cache.open().await;
    cache
}

/// Build the HTTP client for the configured pattern server.
pub fn server_client(config: &Config) -> Result<Arc<HttpPreviewClient>> {
    let client = HttpPreviewClient::new(&config.server.base_url, config.server_timeout())
        .context("Failed to create pattern server client")?;
    Ok(Arc::new(client))
}

/// Remove duplicate ids while keeping the first occurrence's position.
pub fn dedupe(patterns: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    patterns
        .iter()
        .filter(|p| seen.insert(p.as_str()))
        .cloned()
        .collect()
}
