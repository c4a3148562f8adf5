//! Content-addressed upload cache.
//!
//! Avoids re-uploading files the provider has already seen by mapping the
//! SHA-256 of the file content to the uploaded URL. Entries expire after a
//! TTL and the least-recently-used entry is evicted at capacity.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FalError, FalResult};

const HASH_CHUNK_SIZE: usize = 8192;

/// Result of a cache lookup or upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Remote URL of the content
    pub url: String,
    /// True when the URL came from the cache
    pub cached: bool,
    /// Hex digest of the file content
    pub sha256: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// LRU order, least recently used first
    order: Vec<String>,
}

/// LRU + TTL cache from content hash to uploaded URL.
pub struct UploadCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
    ttl: Duration,
}

impl UploadCache {
    /// Create a cache with the given capacity and per-entry TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_size,
            ttl,
        }
    }

    /// Return the cached URL for `path`, or upload it and cache the result.
    ///
    /// The upload runs outside the cache lock; two concurrent misses for
    /// the same content may both upload, and the last writer wins the slot.
    pub async fn get_or_upload<F, Fut>(&self, path: &Path, uploader: F) -> FalResult<UploadOutcome>
    where
        F: FnOnce(std::path::PathBuf) -> Fut,
        Fut: Future<Output = FalResult<String>>,
    {
        if !path.exists() {
            return Err(FalError::FileNotFound(path.display().to_string()));
        }
        if !path.is_file() {
            return Err(FalError::NotAFile(path.display().to_string()));
        }

        let sha256 = hash_file(path).await?;

        {
            let mut inner = self.inner.lock().await;
            if let Some(url) = lookup(&mut inner, &sha256, self.ttl) {
                debug!(hash = %sha256, "upload cache hit");
                return Ok(UploadOutcome {
                    url,
                    cached: true,
                    sha256,
                });
            }
        }

        let url = uploader(path.to_path_buf()).await?;

        let mut inner = self.inner.lock().await;
        insert(&mut inner, self.max_size, &sha256, &url);

        Ok(UploadOutcome {
            url,
            cached: false,
            sha256,
        })
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop all entries.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.order.clear();
    }

    /// Cache statistics.
    pub async fn stats(&self) -> UploadCacheStats {
        UploadCacheStats {
            size: self.inner.lock().await.entries.len(),
            max_size: self.max_size,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Snapshot of the cache's occupancy and configuration.
#[derive(Debug, Clone)]
pub struct UploadCacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_secs: u64,
}

/// Look up a hash, expiring stale entries and promoting hits to MRU.
fn lookup(inner: &mut CacheInner, sha256: &str, ttl: Duration) -> Option<String> {
    let entry = inner.entries.get(sha256)?.clone();
    if entry.inserted_at.elapsed() > ttl {
        inner.entries.remove(sha256);
        inner.order.retain(|h| h != sha256);
        return None;
    }
    inner.order.retain(|h| h != sha256);
    inner.order.push(sha256.to_string());
    Some(entry.url)
}

/// Insert a fresh entry, evicting the LRU entry at capacity.
fn insert(inner: &mut CacheInner, max_size: usize, sha256: &str, url: &str) {
    if !inner.entries.contains_key(sha256) && inner.entries.len() >= max_size {
        if let Some(oldest) = inner.order.first().cloned() {
            inner.entries.remove(&oldest);
            inner.order.remove(0);
            debug!(hash = %oldest, "evicted LRU upload cache entry");
        }
    }
    inner.entries.insert(
        sha256.to_string(),
        CacheEntry {
            url: url.to_string(),
            inserted_at: Instant::now(),
        },
    );
    inner.order.retain(|h| h != sha256);
    inner.order.push(sha256.to_string());
}

/// SHA-256 of a file, read in 8 KiB chunks.
async fn hash_file(path: &Path) -> FalResult<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
