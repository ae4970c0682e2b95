//! Get command handler

use anyhow::Result;
use humansize::{format_size, BINARY};

use ppc::{Config, Point, PreviewRecord};

use super::open_cache;

fn format_point(point: Option<Point>) -> String {
    match point {
        Some(p) => format!("({:.3}, {:.3})", p.x, p.y),
        None => "-".to_string(),
    }
}

/// Describe a cached preview in a few lines.
pub fn describe(pattern: &str, record: &PreviewRecord) -> String {
    let kind = record
        .image_data
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .unwrap_or("raw");
    format!(
        "{}\n   Size: {} ({})\n   First: {}\n   Last: {}",
        pattern,
        format_size(record.size_bytes(), BINARY),
        kind,
        format_point(record.first_coordinate),
        format_point(record.last_coordinate),
    )
}

/// Print the cached preview's metadata, or report a miss.
#[cfg(not(tarpaulin_include))]
pub async fn handle(pattern: &str) -> Result<()> {
    let config = Config::load()?;
    let cache = open_cache(&config).await;
    match cache.get(pattern).await {
        Some(record) => println!("{}", describe(pattern, &record)),
        None => println!("{}: not cached", pattern),
    }
    Ok(())
}
