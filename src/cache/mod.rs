//! Content-addressed result cache with lazy expiry.
//!
//! The cache file is a flat JSON object:
//!
//! ```json
//! { "<sha256 of comments>": { "value": [...], "timestamp": "2024-01-15T10:30:00Z" } }
//! ```
//!
//! A missing or unreadable file is an empty cache. Expired entries are
//! evicted when looked up; there is no background sweep.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::models::Comment;

/// One cached value and when it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.timestamp > ttl
    }
}

/// Stable key for a comment set: hex SHA-256 of its JSON serialization.
pub fn fingerprint(comments: &[Comment]) -> CacheResult<String> {
    let bytes = serde_json::to_vec(comments)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Persistent key → value cache shared across analysis runs.
///
/// Writes replace whole entries; concurrent writers of the same key
/// resolve last-writer-wins.
#[derive(Debug)]
pub struct ResultCache {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    /// In-memory cache that never touches disk.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            path: None,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Open the cache file at `path`, treating a missing or corrupt file as
    /// empty.
    pub async fn open(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let entries = match load_entries(&path).await {
            Ok(entries) => {
                debug!(path = %path.display(), entries = entries.len(), "Result cache loaded");
                entries
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Result cache unreadable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path: Some(path),
            ttl,
            entries: RwLock::new(entries),
        }
    }

    /// Open per configuration.
    pub async fn from_config(config: &CacheConfig) -> Self {
        let secs = i64::try_from(config.ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        let ttl = Duration::seconds(secs);
        Self::open(&config.path, ttl).await
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry. Expired or undecodable entries are evicted and
    /// reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        let stale = {
            let entries = self.entries.read().await;
            let entry = match entries.get(key) {
                Some(entry) => entry,
                None => {
                    debug!(key, "Result cache miss");
                    return None;
                }
            };
            if entry.is_expired(self.ttl, now) {
                debug!(key, "Result cache entry expired");
            } else {
                match serde_json::from_value(entry.value.clone()) {
                    Ok(value) => {
                        debug!(key, "Result cache hit");
                        return Some(value);
                    }
                    Err(e) => warn!(key, error = %e, "Cached value has unexpected shape"),
                }
            }
            entry.timestamp
        };

        self.evict(key, stale).await;
        None
    }

    /// Store a value under `key` and persist the cache.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        self.set_at(key, value, Utc::now()).await
    }

    /// Store a value with an explicit write time.
    pub async fn set_at<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        timestamp: DateTime<Utc>,
    ) -> CacheResult<()> {
        let entry = CacheEntry {
            value: serde_json::to_value(value)?,
            timestamp,
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
        self.persist(&entries).await
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry.
    pub async fn clear(&self) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.persist(&entries).await
    }

    /// Remove `key` if it still holds the entry written at `observed`. A
    /// newer write that landed between the read and this call is kept.
    async fn evict(&self, key: &str, observed: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        if entries.get(key).map(|e| e.timestamp) != Some(observed) {
            debug!(key, "Cache entry replaced before eviction");
            return;
        }
        if entries.remove(key).is_some() {
            if let Err(e) = self.persist(&entries).await {
                warn!(key, error = %e, "Failed to persist cache eviction");
            }
        }
    }

    /// Write the whole map atomically: temp file, then rename.
    async fn persist(&self, entries: &HashMap<String, CacheEntry>) -> CacheResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(entries)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

async fn load_entries(path: &Path) -> CacheResult<HashMap<String, CacheEntry>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes).map_err(|e| CacheError::Corruption {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
