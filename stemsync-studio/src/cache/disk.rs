//! On-disk cache tier
//!
//! One data file per URL named by the SHA-256 of the URL, plus a JSON
//! metadata sidecar carrying the original URL, size and access times.
//! Writes trim the directory back under the [`CachePolicy`] entry and
//! byte limits, oldest access first.

use super::{AudioBytes, CachePolicy};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use stemsync_common::keys::url_cache_key;
use tokio::fs;
use tracing::{debug, info};

const DATA_EXT: &str = "bin";
const META_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskMeta {
    url: String,
    size: usize,
    created_at: DateTime<Utc>,
    #[serde(default = "stemsync_common::time::now")]
    last_accessed: DateTime<Utc>,
}

/// Persistent byte store rooted at a directory
#[derive(Debug, Clone)]
pub struct DiskAudioCache {
    dir: PathBuf,
}

impl DiskAudioCache {
    /// Open (creating if needed) a cache directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "Disk audio cache opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = url_cache_key(url);
        (
            self.dir.join(format!("{key}.{DATA_EXT}")),
            self.dir.join(format!("{key}.{META_EXT}")),
        )
    }

    async fn read_meta(path: &Path) -> Result<Option<DiskMeta>> {
        match fs::read(path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a payload; entries older than `max_age` are removed and miss
    pub async fn get(&self, url: &str, max_age: chrono::Duration) -> Result<Option<AudioBytes>> {
        let (data_path, meta_path) = self.paths(url);
        let Some(meta) = Self::read_meta(&meta_path).await? else {
            return Ok(None);
        };

        if meta.url != url {
            debug!(url = %url, stored = %meta.url, "Disk cache key collision, treating as miss");
            return Ok(None);
        }

        if Utc::now() - meta.created_at > max_age {
            debug!(url = %url, "Disk cache entry expired");
            self.remove(url).await?;
            return Ok(None);
        }

        let bytes = match fs::read(&data_path).await {
            Ok(bytes) => AudioBytes::from(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let touched = DiskMeta {
            last_accessed: Utc::now(),
            ..meta
        };
        if let Err(e) = Self::write_meta(&meta_path, &touched).await {
            debug!(url = %url, error = %e, "Disk cache access time not updated");
        }
        Ok(Some(bytes))
    }

    async fn write_meta(path: &Path, meta: &DiskMeta) -> Result<()> {
        fs::write(path, serde_json::to_vec(meta)?).await?;
        Ok(())
    }

    /// Write a payload (data first, then the sidecar that makes it visible)
    pub async fn put(&self, url: &str, bytes: &[u8]) -> Result<()> {
        let (data_path, meta_path) = self.paths(url);
        fs::write(&data_path, bytes).await?;

        let now = Utc::now();
        let meta = DiskMeta {
            url: url.to_string(),
            size: bytes.len(),
            created_at: now,
            last_accessed: now,
        };
        Self::write_meta(&meta_path, &meta).await
    }

    /// Evict least recently accessed entries until the directory is within
    /// `policy.max_entries` and `policy.max_total_bytes`; returns the number removed
    pub async fn enforce_limits(&self, policy: &CachePolicy) -> Result<usize> {
        let mut entries = self.stored_entries().await?;
        entries.sort_by(|a, b| (a.last_accessed, a.created_at).cmp(&(b.last_accessed, b.created_at)));

        let mut total: usize = entries.iter().map(|m| m.size).sum();
        let mut removed = 0;
        let mut oldest = entries.into_iter().peekable();
        while oldest.peek().is_some() {
            let remaining = oldest.len();
            if remaining <= policy.max_entries && total <= policy.max_total_bytes {
                break;
            }
            let count = ((remaining as f64 * policy.eviction_fraction).ceil() as usize).clamp(1, remaining);
            for meta in oldest.by_ref().take(count) {
                self.remove(&meta.url).await?;
                total = total.saturating_sub(meta.size);
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, remaining_bytes = total, "Disk audio cache trimmed");
        }
        Ok(removed)
    }

    pub async fn contains(&self, url: &str) -> bool {
        let (_, meta_path) = self.paths(url);
        fs::try_exists(&meta_path).await.unwrap_or(false)
    }

    pub async fn remove(&self, url: &str) -> Result<()> {
        let (data_path, meta_path) = self.paths(url);
        for path in [meta_path, data_path] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Remove every entry; returns the number removed
    pub async fn clear(&self) -> Result<usize> {
        let entries = self.stored_entries().await?;
        for meta in &entries {
            self.remove(&meta.url).await?;
        }
        Ok(entries.len())
    }

    /// Remove entries older than `max_age`; returns the number removed
    pub async fn cleanup_expired(&self, max_age: chrono::Duration) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for meta in self.stored_entries().await? {
            if now - meta.created_at > max_age {
                self.remove(&meta.url).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn stored_entries(&self) -> Result<Vec<DiskMeta>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            // Unreadable sidecars are skipped
            if let Ok(Some(meta)) = Self::read_meta(&path).await {
                entries.push(meta);
            }
        }
        Ok(entries)
    }
}
