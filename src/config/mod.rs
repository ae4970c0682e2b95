//! Configuration management for ppc

mod io;
mod types;

pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::fetch::FetchSettings;

impl Config {
    /// Get the config file path (~/.config/ppc/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        io::config_path()
    }

    /// Get the config directory path (~/.config/ppc)
    pub fn config_dir() -> Result<PathBuf> {
        io::config_dir()
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        io::load()
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        io::load_from(path)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        io::save(self)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        io::save_to(self, path)
    }

    /// Expand ~ in cache directory path
    pub fn cache_directory(&self) -> PathBuf {
        let dir = &self.cache.directory;
        if let Some(stripped) = dir.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        PathBuf::from(dir)
    }

    /// Reject values the cache and fetch layers cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.max_bytes == 0 {
            return Err("cache.max_bytes must be > 0".to_string());
        }
        if self.cache.memory_capacity == 0 {
            return Err("cache.memory_capacity must be > 0".to_string());
        }
        if self.fetch.chunk_size == 0 {
            return Err("fetch.chunk_size must be > 0".to_string());
        }
        if self.fetch.chunk_size > 100 {
            return Err(format!(
                "fetch.chunk_size {} exceeds maximum (100)",
                self.fetch.chunk_size
            ));
        }
        if self.server.base_url.trim().is_empty() {
            return Err("server.base_url must not be empty".to_string());
        }
        if self.server.timeout_secs == 0 {
            return Err("server.timeout_secs must be > 0".to_string());
        }
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_bytes: self.cache.max_bytes,
            memory_capacity: self.cache.memory_capacity,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            chunk_size: self.fetch.chunk_size,
            chunk_delay: Duration::from_millis(self.fetch.chunk_delay_ms),
            coalesce_window: Duration::from_millis(self.fetch.coalesce_window_ms),
        }
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }
}
