//! Cache-all command handler

use anyhow::{Context, Result};

use ppc::{BulkCacheJob, BulkProgress, Config};

use super::{open_cache, server_client};

/// Render one progress line, e.g. `[10/25] 40%`.
pub fn format_progress(progress: &BulkProgress) -> String {
    let line = format!(
        "[{}/{}] {:.0}%",
        progress.completed,
        progress.total,
        progress.percent()
    );
    if progress.done {
        format!("{} done", line)
    } else {
        line
    }
}

/// Cache previews for every pattern in the server's catalog.
///
/// Ctrl-C stops the job at the next chunk boundary.
#[cfg(not(tarpaulin_include))]
pub async fn handle() -> Result<()> {
    let config = Config::load()?;
    let cache = open_cache(&config).await;
    let client = server_client(&config)?;

    let job = BulkCacheJob::new(
        cache.clone(),
        client.clone(),
        client,
        config.fetch_settings(),
    );

    let token = job.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping after the current chunk...");
        token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let outcome = job
        .run(|progress| eprintln!("{}", format_progress(&progress)))
        .await;

    if !outcome.success {
        anyhow::bail!("Caching failed, run with -v for details");
    }

    if job.cancel_token().is_cancelled() {
        println!("Cancelled after {} patterns", outcome.cached);
    } else if outcome.cached == 0 {
        println!("Everything is already cached");
    } else {
        println!("Processed {} uncached patterns", outcome.cached);
    }
    println!("{}", cache.stats().await.summary());
    Ok(())
}
