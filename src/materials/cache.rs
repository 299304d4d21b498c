//! Property cache backends
//!
//! ## Table of Contents
//! - **PropertyCache**: Trait for cache backends
//! - **MemoryCache**: Concurrent in-memory cache (default)
//! - **FileCache**: JSON-file-backed persistent cache
//!
//! Entries carry a TTL; expiry is lazy (checked on read) and writes are
//! idempotent last-writer-wins overwrites, so no cross-key locking is
//! needed.

use crate::error::{GalvaniError, Result};
use crate::types::MaterialRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Cached material record with its TTL envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRecord {
    /// The cached record
    pub record: MaterialRecord,
    /// When the record was written
    pub stored_at: DateTime<Utc>,
    /// Time-to-live in seconds
    pub ttl_secs: u64,
}

impl CachedRecord {
    /// Wrap a record with a TTL starting now
    pub fn new(record: MaterialRecord, ttl_secs: u64) -> Self {
        Self {
            record,
            stored_at: Utc::now(),
            ttl_secs,
        }
    }

    /// Whether the record has outlived its TTL
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.stored_at + chrono::Duration::seconds(self.ttl_secs as i64)
    }
}

/// Trait for property cache backends
#[async_trait]
pub trait PropertyCache: Send + Sync {
    /// Get an unexpired record by key
    async fn get(&self, key: &str) -> Result<Option<CachedRecord>>;

    /// Overwrite the record for a key
    async fn put(&self, key: &str, record: CachedRecord) -> Result<()>;

    /// Cache name for logging
    fn name(&self) -> &str;
}

/// Type alias for a shared cache instance
pub type BoxedPropertyCache = Arc<dyn PropertyCache>;

/// Concurrent in-memory cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    data: DashMap<String, CachedRecord>,
}

impl MemoryCache {
    /// Create an empty memory cache
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }
}

#[async_trait]
impl PropertyCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CachedRecord>> {
        match self.data.get(key) {
            // Expired entries read as misses; the next write overwrites them.
            Some(entry) if entry.is_expired() => Ok(None),
            Some(entry) => Ok(Some(entry.value().clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, record: CachedRecord) -> Result<()> {
        self.data.insert(key.to_string(), record);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// JSON-file-backed persistent cache
///
/// Loads existing entries on open; `flush` persists the current state.
pub struct FileCache {
    path: PathBuf,
    data: DashMap<String, CachedRecord>,
}

impl FileCache {
    /// Open or create a file cache
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let data = DashMap::new();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| GalvaniError::lookup(format!("failed to read cache: {}", e)))?;
            let loaded: BTreeMap<String, CachedRecord> =
                serde_json::from_str(&contents).unwrap_or_default();
            for (key, record) in loaded {
                data.insert(key, record);
            }
        }

        info!(path = %path.display(), "File cache opened");
        Ok(Self { path, data })
    }

    /// Persist entries to disk
    pub fn flush(&self) -> Result<()> {
        let snapshot: BTreeMap<String, CachedRecord> = self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let contents = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GalvaniError::lookup(format!("failed to create dir: {}", e)))?;
        }
        std::fs::write(&self.path, contents)
            .map_err(|e| GalvaniError::lookup(format!("failed to write cache: {}", e)))?;

        debug!(path = %self.path.display(), "File cache flushed");
        Ok(())
    }
}

#[async_trait]
impl PropertyCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<CachedRecord>> {
        match self.data.get(key) {
            Some(entry) if entry.is_expired() => Ok(None),
            Some(entry) => Ok(Some(entry.value().clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, record: CachedRecord) -> Result<()> {
        self.data.insert(key.to_string(), record);
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Cache key builders
pub mod keys {
    /// Build the cache key for a material and its requested properties
    ///
    /// Shape: `material:<name>:<sorted-joined-property-list>`.
    pub fn material(name: &str, properties: &[String]) -> String {
        let mut sorted: Vec<&str> = properties.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        format!("material:{}:{}", name, sorted.join("_"))
    }
}
