//! Status command handler

use anyhow::Result;

use ppc::Config;

use super::open_cache;

/// Display cache statistics.
///
/// Shows persistent usage against the byte budget, entry counts for both
/// tiers and the access-time range of stored previews.
#[cfg(not(tarpaulin_include))]
pub async fn handle() -> Result<()> {
    let config = Config::load()?;
    let cache = open_cache(&config).await;
    let stats = cache.stats().await;
    println!("{}", stats.summary());
    println!("   Location: {}", config.cache_directory().display());
    Ok(())
}
