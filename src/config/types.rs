//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_MAX_BYTES, DEFAULT_MEMORY_CAPACITY};
use crate::fetch::MAX_BATCH_SIZE;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Cache tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory of the persistent tier (`~` is expanded)
    #[serde(default = "default_cache_directory")]
    pub directory: String,
    /// Byte budget of the persistent tier
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Entry cap of the in-memory tier
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

pub fn default_cache_directory() -> String {
    "~/.cache/ppc/previews".to_string()
}

pub fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

pub fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            max_bytes: default_max_bytes(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

/// Batching and pacing of preview requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Ids per network call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between consecutive chunks
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    /// Quiet period before coalesced requests are sent
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,
}

pub fn default_chunk_size() -> usize {
    MAX_BATCH_SIZE
}

pub fn default_chunk_delay_ms() -> u64 {
    100
}

pub fn default_coalesce_window_ms() -> u64 {
    50
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
            coalesce_window_ms: default_coalesce_window_ms(),
        }
    }
}

/// Pattern server connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

pub fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
