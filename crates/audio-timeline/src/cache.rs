//! Decoded-asset memoization.
//!
//! Owned cache object instead of process-wide state: whoever constructs
//! assets holds the cache, and tests get a fresh one each. Lookup and insert
//! happen under one lock, so concurrent `get_or_create` calls for the same
//! source settle on a single asset.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::asset::AudioAsset;
use crate::source::{AudioSource, SourceKey};

/// Memoizes [`AudioAsset`] construction by source identity.
#[derive(Default)]
pub struct AssetCache {
    inner: Mutex<HashMap<SourceKey, Arc<AudioAsset>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached asset for `source`, constructing and inserting it on
    /// a miss. Returns `None` only for empty sources.
    pub fn get_or_create(&self, source: &AudioSource) -> Option<Arc<AudioAsset>> {
        let key = source.key()?;
        let mut map = self.inner.lock().unwrap();
        if let Some(asset) = map.get(&key) {
            return Some(asset.clone());
        }
        let asset = AudioAsset::make(source.clone())?;
        map.insert(key, asset.clone());
        Some(asset)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_source_shares_one_asset() {
        let cache = AssetCache::new();
        let source = AudioSource::from_path("/tmp/song.flac");
        let a = cache.get_or_create(&source).unwrap();
        let b = cache.get_or_create(&source.clone()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_sources_get_distinct_assets() {
        let cache = AssetCache::new();
        let a = cache
            .get_or_create(&AudioSource::from_path("/tmp/a.flac"))
            .unwrap();
        let b = cache
            .get_or_create(&AudioSource::from_path("/tmp/b.flac"))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn byte_buffers_dedup_by_identity_not_content() {
        let cache = AssetCache::new();
        let shared = AudioSource::from_bytes(vec![1, 2, 3]);
        let a = cache.get_or_create(&shared).unwrap();
        let b = cache.get_or_create(&shared.clone()).unwrap();
        let other = cache
            .get_or_create(&AudioSource::from_bytes(vec![1, 2, 3]))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn empty_source_is_never_cached() {
        let cache = AssetCache::new();
        assert!(cache.get_or_create(&AudioSource::Empty).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_resets_the_cache() {
        let cache = AssetCache::new();
        cache
            .get_or_create(&AudioSource::from_path("/tmp/a.flac"))
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
