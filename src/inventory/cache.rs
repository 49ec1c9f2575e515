//! Inventory caching
//!
//! Assembled graphs are cached under a [`Fingerprint`] of the hosts
//! directory: a SHA-256 digest over the relative path, size and
//! modification time of every file in the tree, salted with the effective
//! configuration. Any change to the checkout or the configuration yields a
//! new fingerprint, so stale entries are never served; entries also expire
//! after `cache_timeout` seconds.
//!
//! Two stores are provided:
//! - [`MemoryCacheStore`]: process-local map
//! - [`JsonFileCacheStore`]: one JSON document per fingerprint on disk
//!
//! # Example
//!
//! ```rust,ignore
//! use git_hosts::inventory::cache::{CacheStore, Fingerprint, MemoryCacheStore};
//! use std::time::Duration;
//!
//! let store = MemoryCacheStore::new();
//! let fingerprint = Fingerprint::compute(&root, b"")?;
//!
//! if store.get(&fingerprint).await.is_none() {
//!     store.put(&fingerprint, &graph, Duration::from_secs(3600)).await?;
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::debug;
use walkdir::WalkDir;

use super::InventoryGraph;
use crate::config::{CacheBackend, GitHostsConfig};
use crate::error::{Error, Result};

// ============================================================================
// Fingerprint
// ============================================================================

/// Digest of the source tree's modification state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint every file below `root`, mixing in `salt`.
    ///
    /// `.git` directories are skipped; the external sync job touches them
    /// on every fetch even when no host file changed.
    pub fn compute(root: &Path, salt: &[u8]) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(salt);

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        for entry in walker {
            let entry = entry.map_err(|e| Error::cache(format!("walking {}: {}", root.display(), e)))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| Error::cache(e.to_string()))?;
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());

            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(metadata.len().to_le_bytes());
            hasher.update(modified.to_le_bytes());
        }

        let digest = hasher.finalize();
        Ok(Self(digest.iter().map(|b| format!("{:02x}", b)).collect()))
    }

    /// Fingerprint the hosts directory of a configuration, salted with the
    /// configuration itself
    pub fn for_config(config: &GitHostsConfig) -> Result<Self> {
        let salt = serde_json::to_vec(config)?;
        Self::compute(&config.hosts_directory, &salt)
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Cache Entry
// ============================================================================

/// A cached graph with its lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached graph
    pub graph: InventoryGraph,
    /// When this entry was created
    pub created_at: DateTime<Utc>,
    /// When this entry expires
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry expiring after `ttl`
    pub fn new(graph: InventoryGraph, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            graph,
            created_at,
            expires_at: created_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Check if this entry has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// ============================================================================
// Cache Metrics
// ============================================================================

/// Hit/miss counters shared by the stores
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl CacheMetrics {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries stored
    pub writes: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of lookups that hit
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {}, misses: {}, writes: {}, hit rate: {:.1}%",
            self.hits,
            self.misses,
            self.writes,
            self.hit_rate() * 100.0
        )
    }
}

// ============================================================================
// Store Contract
// ============================================================================

/// Key-value store for assembled graphs
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name, for logging
    fn name(&self) -> &str;

    /// Look up a live entry
    async fn get(&self, fingerprint: &Fingerprint) -> Option<InventoryGraph>;

    /// Store a graph for `ttl`
    async fn put(&self, fingerprint: &Fingerprint, graph: &InventoryGraph, ttl: Duration) -> Result<()>;

    /// Counters for this store
    fn stats(&self) -> CacheStatsSnapshot;
}

/// Open the store selected by a configuration
pub fn open_store(config: &GitHostsConfig) -> Arc<dyn CacheStore> {
    match config.cache_plugin {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
        CacheBackend::Jsonfile => Arc::new(JsonFileCacheStore::new(config.cache_dir())),
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
    metrics: CacheMetrics,
}

impl MemoryCacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Option<InventoryGraph> {
        let mut entries = self.entries.write().await;
        match entries.get(fingerprint) {
            Some(entry) if !entry.is_expired() => {
                self.metrics.record_hit();
                Some(entry.graph.clone())
            }
            Some(_) => {
                entries.remove(fingerprint);
                self.metrics.record_miss();
                None
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    async fn put(&self, fingerprint: &Fingerprint, graph: &InventoryGraph, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(fingerprint.clone(), CacheEntry::new(graph.clone(), ttl));
        self.metrics.record_write();
        Ok(())
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.metrics.snapshot()
    }
}

// ============================================================================
// JSON File Store
// ============================================================================

/// Cache persisted as JSON documents in a directory
#[derive(Debug)]
pub struct JsonFileCacheStore {
    dir: PathBuf,
    metrics: CacheMetrics,
}

impl JsonFileCacheStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            metrics: CacheMetrics::default(),
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}{}.json", ENTRY_PREFIX, fingerprint.as_str()))
    }

    /// Remove expired or unreadable entries other than `keep`.
    ///
    /// Every checkout change produces a new fingerprint, so superseded
    /// entries are only ever reclaimed here. Failures are logged and
    /// skipped. Returns the number of files removed.
    async fn prune(&self, keep: &Path) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping cache pruning in {}: {}", self.dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path == keep || !is_entry_file(&path) {
                continue;
            }

            let stale = match tokio::fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<CacheEntry>(&content)
                    .map(|entry| entry.is_expired())
                    .unwrap_or(true),
                Err(_) => continue,
            };
            if !stale {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => debug!("Could not remove cache entry {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            debug!("Pruned {} stale cache entries from {}", removed, self.dir.display());
        }
        removed
    }
}

const ENTRY_PREFIX: &str = "git_hosts_";

fn is_entry_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(ENTRY_PREFIX) && name.ends_with(".json"))
        .unwrap_or(false)
}

#[async_trait]
impl CacheStore for JsonFileCacheStore {
    fn name(&self) -> &str {
        "jsonfile"
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Option<InventoryGraph> {
        let path = self.entry_path(fingerprint);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => {
                self.metrics.record_miss();
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) if !entry.is_expired() => {
                self.metrics.record_hit();
                Some(entry.graph)
            }
            Ok(_) => {
                debug!("Removing expired cache entry {}", path.display());
                let _ = tokio::fs::remove_file(&path).await;
                self.metrics.record_miss();
                None
            }
            Err(e) => {
                debug!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                self.metrics.record_miss();
                None
            }
        }
    }

    async fn put(&self, fingerprint: &Fingerprint, graph: &InventoryGraph, ttl: Duration) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let entry = CacheEntry::new(graph.clone(), ttl);
        let json = serde_json::to_string(&entry)?;

        // Write then rename so concurrent readers never see a partial file
        let path = self.entry_path(fingerprint);
        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        self.metrics.record_write();
        debug!("Stored inventory cache entry {}", path.display());

        self.prune(&path).await;
        Ok(())
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.metrics.snapshot()
    }
}

// ============================================================================
// Tests
// ============================================================================
