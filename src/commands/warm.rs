//! Warm command handler

use anyhow::Result;

use ppc::{BatchFetchCoordinator, Config};

use super::{dedupe, open_cache, server_client};

/// Route the given patterns through the request coordinator and wait for
/// the resulting fetch to settle.
#[cfg(not(tarpaulin_include))]
pub async fn handle(patterns: &[String]) -> Result<()> {
    let config = Config::load()?;
    let cache = open_cache(&config).await;
    let client = server_client(&config)?;
    let patterns = dedupe(patterns);

    let coordinator = BatchFetchCoordinator::new(cache.clone(), client, config.fetch_settings());
    coordinator.prefetch(&patterns);
    coordinator.wait_idle().await;

    let cached = cache.batch_get(&patterns).await;
    println!("{}/{} patterns cached", cached.len(), patterns.len());
    for pattern in patterns.iter().filter(|p| !cached.contains_key(*p)) {
        println!("   missing: {}", pattern);
    }
    Ok(())
}
