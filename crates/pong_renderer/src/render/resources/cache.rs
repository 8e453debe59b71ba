//! Bounded read-through cache keyed by asset

use std::collections::HashMap;
use std::sync::Arc;

use crate::render::assets::AssetId;
use crate::render::error::{RenderError, RenderResult};

/// Session-long cache of GPU resources, one entry per asset.
///
/// Entries are never evicted. Once `capacity` entries exist, any miss is a
/// [`RenderError::CapacityExceeded`].
#[derive(Debug)]
pub struct ResourceCache<V> {
    entries: HashMap<AssetId, Arc<V>>,
    capacity: usize,
    resource: &'static str,
}

impl<V> ResourceCache<V> {
    /// Create an empty cache; `resource` names it in capacity errors
    pub fn new(resource: &'static str, capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            resource,
        }
    }

    /// Return the cached entry or build one with `create`.
    ///
    /// Nothing is inserted when `create` fails, and `create` is not called at
    /// all when the cache is already full.
    pub fn get_or_try_insert_with<F>(&mut self, asset: AssetId, create: F) -> RenderResult<Arc<V>>
    where
        F: FnOnce() -> RenderResult<V>,
    {
        if let Some(entry) = self.entries.get(&asset) {
            return Ok(Arc::clone(entry));
        }

        if self.entries.len() >= self.capacity {
            return Err(RenderError::capacity(self.resource, self.entries.len() + 1, self.capacity));
        }

        let entry = Arc::new(create()?);
        self.entries.insert(asset, Arc::clone(&entry));
        Ok(entry)
    }

    /// Check if an asset is cached
    pub fn contains(&self, asset: AssetId) -> bool {
        self.entries.contains_key(&asset)
    }

    /// Get the number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_returns_same_entry() {
        let mut cache = ResourceCache::new("test cache", 2);
        let mut creations = 0;

        let first = cache
            .get_or_try_insert_with(AssetId(1), || {
                creations += 1;
                Ok("ball")
            })
            .unwrap();
        let second = cache
            .get_or_try_insert_with(AssetId(1), || {
                creations += 1;
                Ok("other")
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(creations, 1);
    }

    #[test]
    fn test_failed_creation_is_not_cached() {
        let mut cache: ResourceCache<u32> = ResourceCache::new("test cache", 2);

        let result = cache.get_or_try_insert_with(AssetId(1), || Err(RenderError::MissingAsset(AssetId(1))));

        assert!(result.is_err());
        assert!(!cache.contains(AssetId(1)));
        assert!(cache.get_or_try_insert_with(AssetId(1), || Ok(5)).is_ok());
    }

    #[test]
    fn test_full_cache_rejects_new_assets_but_serves_hits() {
        let mut cache = ResourceCache::new("test cache", 1);
        cache.get_or_try_insert_with(AssetId(1), || Ok(1)).unwrap();

        let mut called = false;
        let result = cache.get_or_try_insert_with(AssetId(2), || {
            called = true;
            Ok(2)
        });

        assert!(matches!(
            result,
            Err(RenderError::CapacityExceeded {
                resource: "test cache",
                requested: 2,
                capacity: 1
            })
        ));
        assert!(!called);
        assert_eq!(*cache.get_or_try_insert_with(AssetId(1), || Ok(9)).unwrap(), 1);
    }
}
