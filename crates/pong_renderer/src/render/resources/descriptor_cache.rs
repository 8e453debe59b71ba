//! Read-through cache of per-asset descriptor sets

use std::sync::Arc;

use super::cache::ResourceCache;
use crate::render::assets::AssetId;
use crate::render::error::RenderResult;

/// A descriptor set bound to one asset's texture
#[derive(Debug)]
pub struct DescriptorBinding<S, T> {
    /// Asset the set samples
    pub asset: AssetId,
    /// Descriptor set handle
    pub set: S,
    /// Texture referenced by the set, kept alive as long as the binding
    pub image: Arc<T>,
}

/// One descriptor binding per asset, created on first reference
#[derive(Debug)]
pub struct DescriptorCache<S, T> {
    bindings: ResourceCache<DescriptorBinding<S, T>>,
}

impl<S, T> DescriptorCache<S, T> {
    /// Create an empty cache holding at most `max_descriptors` bindings
    pub fn new(max_descriptors: usize) -> Self {
        Self {
            bindings: ResourceCache::new("descriptor cache", max_descriptors),
        }
    }

    /// Binding for `asset`, calling `create` on a miss
    pub fn get_or_create<F>(&mut self, asset: AssetId, create: F) -> RenderResult<Arc<DescriptorBinding<S, T>>>
    where
        F: FnOnce() -> RenderResult<DescriptorBinding<S, T>>,
    {
        self.bindings.get_or_try_insert_with(asset, create)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no binding was created yet
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
