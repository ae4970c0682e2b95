//! Invalidate and clear command handlers

use anyhow::Result;

use ppc::Config;

use super::open_cache;

/// Drop one pattern's preview from both tiers.
#[cfg(not(tarpaulin_include))]
pub async fn handle_invalidate(pattern: &str) -> Result<()> {
    let config = Config::load()?;
    let cache = open_cache(&config).await;
    cache.invalidate(pattern).await;
    println!("Invalidated {}", pattern);
    Ok(())
}

/// Drop every cached preview.
#[cfg(not(tarpaulin_include))]
pub async fn handle_clear() -> Result<()> {
    let config = Config::load()?;
    let cache = open_cache(&config).await;
    let before = cache.stats().await;
    cache.clear().await;
    println!(
        "Cleared {} previews ({})",
        before.entry_count,
        before.size_human()
    );
    Ok(())
}
