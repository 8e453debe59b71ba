//! Read-through cache of uploaded sprite textures

use std::sync::Arc;

use super::cache::ResourceCache;
use super::TextureUploader;
use crate::render::assets::{AssetId, AssetSource};
use crate::render::error::{RenderError, RenderResult};

/// One uploaded texture per asset, created on first reference
#[derive(Debug)]
pub struct ImageCache<T> {
    images: ResourceCache<T>,
}

impl<T> ImageCache<T> {
    /// Create an empty cache holding at most `max_images` textures
    pub fn new(max_images: usize) -> Self {
        Self {
            images: ResourceCache::new("image cache", max_images),
        }
    }

    /// Texture for `asset`, loading and uploading it on a miss.
    ///
    /// Fails with [`RenderError::MissingAsset`] if the collaborator has no data,
    /// and with [`RenderError::InvalidAsset`] if the data is empty or truncated.
    pub fn get_image<U>(&mut self, asset: AssetId, assets: &dyn AssetSource, uploader: &mut U) -> RenderResult<Arc<T>>
    where
        U: TextureUploader<Texture = T> + ?Sized,
    {
        self.images.get_or_try_insert_with(asset, || {
            let data = assets.load(asset).ok_or(RenderError::MissingAsset(asset))?;
            data.validate(asset)?;

            log::debug!("Uploading image for asset {asset}: {}x{}", data.width, data.height);
            uploader.upload(asset, data)
        })
    }

    /// Number of uploaded textures
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether nothing was uploaded yet
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
