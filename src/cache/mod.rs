//! Revalidation cache for generated pages
//!
//! Every generated page is recorded by site path with the time it was
//! generated and a hash of its HTML. A page is served as is while it is
//! younger than the revalidation window; after that it is still served but
//! regenerated in the background. The index is persisted next to the site
//! so a restarted server keeps the schedule.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::error::Result;

/// Cache directory name
pub const CACHE_DIR: &str = ".blog-cache";

/// Cache file name
const CACHE_FILE: &str = ".blog-cache/pages.json";

/// A generated page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Generation time (as unix timestamp)
    pub generated_at: u64,
    /// Output path relative to public dir
    pub output_path: String,
    /// Hash of the generated HTML
    pub content_hash: u64,
}

/// Result of looking up a path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// Generated within the window
    Fresh(&'a CacheEntry),
    /// Generated, but the window has elapsed
    Stale(&'a CacheEntry),
    /// Never generated
    Missing,
}

/// Index of generated pages, keyed by site path
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageCache {
    /// Version of the cache format
    pub version: u32,
    pub pages: HashMap<String, CacheEntry>,
}

impl PageCache {
    /// Current cache format version
    const VERSION: u32 = 1;

    /// Create a new cache with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    /// Load cache from disk, or create a new empty cache
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = base_dir.join(CACHE_FILE);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            if let Ok(cache) = serde_json::from_str::<PageCache>(&content) {
                if cache.version == Self::VERSION {
                    return cache;
                }
                tracing::info!("Cache version mismatch, starting a new cache");
            }
        }
        Self::new()
    }

    /// Save cache to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir.join(CACHE_DIR))?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(base_dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    /// Save cache to disk from async code
    pub async fn save_async(&self, base_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(base_dir.join(CACHE_DIR)).await?;
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(base_dir.join(CACHE_FILE), content).await?;
        Ok(())
    }

    /// Record a generated page. Returns false when the HTML is identical to
    /// what was generated before.
    pub fn record(&mut self, path: &str, output_path: &str, html: &str, now: u64) -> bool {
        let content_hash = hash_content(html);
        let changed = self
            .pages
            .get(path)
            .map_or(true, |entry| entry.content_hash != content_hash);

        self.pages.insert(
            path.to_string(),
            CacheEntry {
                generated_at: now,
                output_path: output_path.to_string(),
                content_hash,
            },
        );
        changed
    }

    /// Classify a path against the revalidation window (seconds)
    pub fn lookup(&self, path: &str, now: u64, window: u64) -> Lookup<'_> {
        match self.pages.get(path) {
            Some(entry) if now.saturating_sub(entry.generated_at) < window => Lookup::Fresh(entry),
            Some(entry) => Lookup::Stale(entry),
            None => Lookup::Missing,
        }
    }

    /// Forget a path (its post no longer exists)
    pub fn remove(&mut self, path: &str) -> Option<CacheEntry> {
        self.pages.remove(path)
    }
}

/// Calculate a hash for page content
pub fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Current time as unix timestamp
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
