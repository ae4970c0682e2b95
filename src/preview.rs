//! Preview data model shared by both cache tiers and the fetch layer.

use serde::{Deserialize, Serialize};

/// A point in the pattern's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rendered preview of a pattern as returned by the preview generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRecord {
    /// Encoded image payload (typically a base64 data URL)
    #[serde(default)]
    pub image_data: String,
    #[serde(default)]
    pub first_coordinate: Option<Point>,
    #[serde(default)]
    pub last_coordinate: Option<Point>,
    /// Set by the generator when the preview could not be rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewRecord {
    /// Create a successful preview record.
    pub fn new(
        image_data: impl Into<String>,
        first_coordinate: Option<Point>,
        last_coordinate: Option<Point>,
    ) -> Self {
        Self {
            image_data: image_data.into(),
            first_coordinate,
            last_coordinate,
            error: None,
        }
    }

    /// Create a record carrying a generator error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            image_data: String::new(),
            first_coordinate: None,
            last_coordinate: None,
            error: Some(message.into()),
        }
    }

    /// True when the generator flagged this preview as failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True when the record can be cached: non-empty payload and no error.
    pub fn is_cacheable(&self) -> bool {
        !self.is_error() && !self.image_data.is_empty()
    }

    /// Deterministic storage size of the payload in bytes.
    pub fn size_bytes(&self) -> u64 {
        estimate_size(&self.image_data)
    }
}

/// Estimate the decoded size of a base64-style payload: `ceil(len * 3 / 4)`.
///
/// Derived from the encoded length only, so accounting is identical across runs.
pub fn estimate_size(encoded: &str) -> u64 {
    let len = encoded.len() as u64;
    (len * 3).div_ceil(4)
}

/// A preview as stored in the persistent tier.
///
/// Field names on disk follow the store schema:
/// `{pattern, data, size, lastAccessed, created}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "pattern")]
    pub pattern_id: String,
    #[serde(rename = "data")]
    pub record: PreviewRecord,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// Epoch milliseconds of the last read hit (or the write)
    #[serde(rename = "lastAccessed")]
    pub last_accessed: i64,
    /// Epoch milliseconds of the first write
    pub created: i64,
}

impl CacheEntry {
    /// Build an entry for `record`, sizing it from its payload.
    pub fn new(pattern_id: impl Into<String>, record: PreviewRecord, now_ms: i64) -> Self {
        let size_bytes = record.size_bytes();
        Self {
            pattern_id: pattern_id.into(),
            record,
            size_bytes,
            last_accessed: now_ms,
            created: now_ms,
        }
    }

    /// Bookkeeping fields without the payload.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            pattern_id: self.pattern_id.clone(),
            size_bytes: self.size_bytes,
            last_accessed: self.last_accessed,
            created: self.created,
        }
    }
}

/// The index view of a [`CacheEntry`]: everything except `data`.
///
/// Deserializes directly from a stored entry, skipping the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    #[serde(rename = "pattern")]
    pub pattern_id: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "lastAccessed")]
    pub last_accessed: i64,
    pub created: i64,
}

/// Metadata for one pattern in the catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMetadata {
    /// Catalog path, used as the pattern id
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date_modified: f64,
    #[serde(default)]
    pub coordinates_count: u64,
}
