//! Content-addressed cache of generated hero images.
//!
//! Entries are keyed by the first 16 hex characters of
//! `sha256("{product_id}_{message}_{region}")` and stored as
//! `hero_{key}.png` in the cache storage. Entries never expire; the only
//! eviction is an explicit [`clear_hero_cache`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::storage::{AssetStorage, StorageError};

const KEY_LEN: usize = 16;

/// Cache key for a hero image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage file name for this key.
    pub fn file_name(&self) -> String {
        format!("hero_{}.png", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a (product, message, region) triple.
pub fn cache_key(product_id: &str, message: &str, region: &str) -> CacheKey {
    let digest = Sha256::digest(format!("{product_id}_{message}_{region}").as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(KEY_LEN);
    CacheKey(key)
}

/// Hero image cache over an [`AssetStorage`] backend.
#[derive(Clone)]
pub struct HeroCache {
    storage: Arc<dyn AssetStorage>,
    enabled: bool,
}

impl HeroCache {
    pub fn new(storage: Arc<dyn AssetStorage>, enabled: bool) -> Self {
        Self { storage, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a cached hero. Disabled caches always miss.
    pub fn get(&self, key: &CacheKey) -> Option<DynamicImage> {
        if !self.enabled {
            return None;
        }
        match self.storage.load(&key.file_name()) {
            Ok(Some(img)) => {
                metrics::counter!("hero_cache.hits").increment(1);
                debug!(key = %key, "hero cache hit");
                Some(img)
            }
            Ok(None) => {
                metrics::counter!("hero_cache.misses").increment(1);
                None
            }
            Err(e) => {
                metrics::counter!("hero_cache.errors").increment(1);
                warn!(key = %key, error = %e, "hero cache read failed");
                None
            }
        }
    }

    /// Write a freshly generated hero through to the cache.
    pub fn put(&self, key: &CacheKey, image: &DynamicImage) -> Result<(), StorageError> {
        if !self.enabled {
            return Ok(());
        }
        self.storage.save(&key.file_name(), image)?;
        metrics::counter!("hero_cache.writes").increment(1);
        debug!(key = %key, "hero cached");
        Ok(())
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.enabled && self.storage.exists(&key.file_name())
    }
}

impl fmt::Debug for HeroCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeroCache")
            .field("backend", &self.storage.backend_name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Remove every `hero_*.png` entry from a local cache directory. Returns the
/// number of files removed; a missing directory counts as empty.
pub fn clear_hero_cache(dir: &Path) -> Result<usize, StorageError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(StorageError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("hero_") && name.ends_with(".png") {
            let path = entry.path();
            std::fs::remove_file(&path).map_err(|source| StorageError::Io { path, source })?;
            removed += 1;
        }
    }

    info!(dir = %dir.display(), removed, "hero cache cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use image::{Rgba, RgbaImage};

    fn hero() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])))
    }

    #[test]
    fn test_cache_key_shape() {
        let key = cache_key("p1", "Hello World", "US");
        assert_eq!(key.as_str().len(), 16);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(key.file_name(), format!("hero_{}.png", key));
        assert_eq!(key, cache_key("p1", "Hello World", "US"));
    }

    #[test]
    fn test_cache_key_matches_sha256_prefix() {
        let full = hex::encode(Sha256::digest(b"p1_Hello World_US"));
        assert_eq!(cache_key("p1", "Hello World", "US").as_str(), &full[..16]);
    }

    #[test]
    fn test_cache_key_varies_with_each_input() {
        let base = cache_key("p1", "Hello World", "US");
        assert_ne!(base, cache_key("p2", "Hello World", "US"));
        assert_ne!(base, cache_key("p1", "Hello There", "US"));
        assert_ne!(base, cache_key("p1", "Hello World", "EU"));
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).unwrap());
        let cache = HeroCache::new(storage, true);
        let key = cache_key("p1", "msg here", "US");

        assert!(cache.get(&key).is_none());
        assert!(!cache.contains(&key));
        cache.put(&key, &hero()).unwrap();
        assert!(cache.contains(&key));
        assert!(dir.path().join(key.file_name()).is_file());
        let img = cache.get(&key).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[test]
    fn test_disabled_cache_never_hits_or_writes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).unwrap());
        let cache = HeroCache::new(storage, false);
        let key = cache_key("p1", "msg here", "US");

        cache.put(&key, &hero()).unwrap();
        assert!(!dir.path().join(key.file_name()).exists());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_clear_removes_only_hero_entries() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()).unwrap());
        let cache = HeroCache::new(storage, true);
        cache.put(&cache_key("a", "message", "US"), &hero()).unwrap();
        cache.put(&cache_key("b", "message", "US"), &hero()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        assert_eq!(clear_hero_cache(dir.path()).unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(clear_hero_cache(&dir.path().join("missing")).unwrap(), 0);
    }
}
