//! GPU resources created lazily per asset
//!
//! Textures and descriptor sets are built the first time an asset is drawn and
//! cached for the whole session. The caches only see the GPU through the
//! [`TextureUploader`] and [`DescriptorBinder`] traits, so they can be tested
//! without a device.

pub mod binder;
pub mod cache;
pub mod descriptor_cache;
pub mod image_cache;
pub mod staging;

pub use binder::{SharedBuffers, VulkanDescriptorBinder};
pub use cache::ResourceCache;
pub use descriptor_cache::{DescriptorBinding, DescriptorCache};
pub use image_cache::ImageCache;
pub use staging::StagingUploader;

use std::sync::Arc;

use crate::config::RenderLimits;
use crate::render::assets::{AssetData, AssetId, AssetSource};
use crate::render::error::RenderResult;

/// Turns decoded pixels into a sampled texture
pub trait TextureUploader {
    /// Texture produced by an upload
    type Texture;

    /// Upload `data`, blocking until the texture is ready to sample
    fn upload(&mut self, asset: AssetId, data: AssetData) -> RenderResult<Self::Texture>;
}

/// Creates the descriptor set drawing sprites with one texture
pub trait DescriptorBinder {
    /// Texture type the sets reference
    type Texture;
    /// Descriptor set handle
    type Set: Copy + PartialEq;

    /// Allocate and write a set sampling `texture`
    fn bind(&mut self, asset: AssetId, texture: &Self::Texture) -> RenderResult<Self::Set>;
}

/// Shared cached binding type for an uploader/binder pair
pub type Binding<U, B> = DescriptorBinding<<B as DescriptorBinder>::Set, <U as TextureUploader>::Texture>;

/// Image and descriptor caches together with the collaborators that fill them
pub struct ResourceCaches<U, B>
where
    U: TextureUploader,
    B: DescriptorBinder<Texture = U::Texture>,
{
    // Bindings hold the images they sample, so they go first
    descriptors: DescriptorCache<B::Set, U::Texture>,
    images: ImageCache<U::Texture>,
    binder: B,
    uploader: U,
}

impl<U, B> ResourceCaches<U, B>
where
    U: TextureUploader,
    B: DescriptorBinder<Texture = U::Texture>,
{
    /// Create empty caches sized by `limits`
    pub fn new(uploader: U, binder: B, limits: &RenderLimits) -> Self {
        Self {
            descriptors: DescriptorCache::new(limits.max_descriptors),
            images: ImageCache::new(limits.max_images),
            binder,
            uploader,
        }
    }

    /// Texture for `asset`, uploading it on first use
    pub fn get_image(&mut self, asset: AssetId, assets: &dyn AssetSource) -> RenderResult<Arc<U::Texture>> {
        self.images.get_image(asset, assets, &mut self.uploader)
    }

    /// Descriptor binding for `asset`, creating its texture first if needed
    pub fn get_descriptor(&mut self, asset: AssetId, assets: &dyn AssetSource) -> RenderResult<Arc<Binding<U, B>>> {
        let Self {
            descriptors,
            images,
            binder,
            uploader,
        } = self;

        descriptors.get_or_create(asset, || {
            let image = images.get_image(asset, assets, uploader)?;
            let set = binder.bind(asset, &image)?;

            log::debug!("Created descriptor set for asset {asset}");
            Ok(DescriptorBinding { asset, set, image })
        })
    }

    /// Descriptor set for `asset`
    pub fn descriptor_set(&mut self, asset: AssetId, assets: &dyn AssetSource) -> RenderResult<B::Set> {
        self.get_descriptor(asset, assets).map(|binding| binding.set)
    }

    /// Number of uploaded textures
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Number of descriptor bindings
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// The texture uploader
    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// The descriptor binder
    pub fn binder(&self) -> &B {
        &self.binder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::assets::SpriteSheet;
    use crate::render::error::RenderError;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockAssets {
        data: HashMap<AssetId, AssetData>,
    }

    impl MockAssets {
        fn with(mut self, asset: u32, width: u32, height: u32) -> Self {
            let pixels = vec![255; (width * height * 4) as usize];
            self.data.insert(AssetId(asset), AssetData::new(pixels, width, height));
            self
        }
    }

    impl AssetSource for MockAssets {
        fn load(&self, asset: AssetId) -> Option<AssetData> {
            self.data.get(&asset).cloned()
        }

        fn sprite_sheet(&self, asset: AssetId) -> SpriteSheet {
            self.data
                .get(&asset)
                .map_or(SpriteSheet::single(1, 1), |data| SpriteSheet::single(data.width, data.height))
        }
    }

    #[derive(Debug, PartialEq)]
    struct MockTexture {
        asset: AssetId,
        width: u32,
    }

    #[derive(Default)]
    struct MockUploader {
        uploads: Vec<AssetId>,
    }

    impl TextureUploader for MockUploader {
        type Texture = MockTexture;

        fn upload(&mut self, asset: AssetId, data: AssetData) -> RenderResult<MockTexture> {
            self.uploads.push(asset);
            Ok(MockTexture {
                asset,
                width: data.width,
            })
        }
    }

    #[derive(Default)]
    struct MockBinder {
        bound: Vec<AssetId>,
    }

    impl DescriptorBinder for MockBinder {
        type Texture = MockTexture;
        type Set = u32;

        fn bind(&mut self, asset: AssetId, texture: &MockTexture) -> RenderResult<u32> {
            assert_eq!(texture.asset, asset);
            self.bound.push(asset);
            Ok(100 + asset.0)
        }
    }

    fn caches(limits: &RenderLimits) -> ResourceCaches<MockUploader, MockBinder> {
        crate::foundation::logging::try_init();
        ResourceCaches::new(MockUploader::default(), MockBinder::default(), limits)
    }

    #[test]
    fn test_image_uploaded_once() {
        let assets = MockAssets::default().with(1, 50, 50);
        let mut caches = caches(&RenderLimits::default());

        let first = caches.get_image(AssetId(1), &assets).unwrap();
        let second = caches.get_image(AssetId(1), &assets).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(caches.uploader().uploads, vec![AssetId(1)]);
        assert_eq!(first.width, 50);
    }

    #[test]
    fn test_descriptor_created_once_per_asset() {
        let assets = MockAssets::default().with(1, 50, 50).with(2, 50, 100);
        let mut caches = caches(&RenderLimits::default());

        let first = caches.get_descriptor(AssetId(1), &assets).unwrap();
        let again = caches.get_descriptor(AssetId(1), &assets).unwrap();
        let other = caches.get_descriptor(AssetId(2), &assets).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.set, 101);
        assert_eq!(other.set, 102);
        assert_eq!(caches.binder().bound, vec![AssetId(1), AssetId(2)]);
    }

    #[test]
    fn test_descriptor_creates_image_transitively() {
        let assets = MockAssets::default().with(3, 240, 240);
        let mut caches = caches(&RenderLimits::default());

        let binding = caches.get_descriptor(AssetId(3), &assets).unwrap();
        let image = caches.get_image(AssetId(3), &assets).unwrap();

        assert!(Arc::ptr_eq(&binding.image, &image));
        assert_eq!(caches.image_count(), 1);
        assert_eq!(caches.uploader().uploads.len(), 1);
    }

    #[test]
    fn test_missing_asset_fails() {
        let mut caches = caches(&RenderLimits::default());

        assert!(matches!(
            caches.get_descriptor(AssetId(9), &MockAssets::default()),
            Err(RenderError::MissingAsset(AssetId(9)))
        ));
        assert_eq!(caches.descriptor_count(), 0);
        assert!(caches.binder().bound.is_empty());
    }

    #[test]
    fn test_zero_byte_asset_is_not_uploaded() {
        let mut assets = MockAssets::default();
        assets.data.insert(AssetId(4), AssetData::new(Vec::new(), 8, 8));
        let mut caches = caches(&RenderLimits::default());

        assert!(matches!(
            caches.get_image(AssetId(4), &assets),
            Err(RenderError::InvalidAsset { .. })
        ));
        assert!(caches.uploader().uploads.is_empty());
    }

    #[test]
    fn test_image_budget() {
        let limits = RenderLimits {
            max_images: 1,
            ..RenderLimits::default()
        };
        let assets = MockAssets::default().with(1, 2, 2).with(2, 2, 2);
        let mut caches = caches(&limits);

        caches.get_image(AssetId(1), &assets).unwrap();
        assert!(matches!(
            caches.get_image(AssetId(2), &assets),
            Err(RenderError::CapacityExceeded { resource: "image cache", .. })
        ));
        assert_eq!(caches.uploader().uploads, vec![AssetId(1)]);
    }

    #[test]
    fn test_descriptor_budget_checked_before_upload() {
        let limits = RenderLimits {
            max_descriptors: 1,
            ..RenderLimits::default()
        };
        let assets = MockAssets::default().with(1, 2, 2).with(2, 2, 2);
        let mut caches = caches(&limits);

        caches.descriptor_set(AssetId(1), &assets).unwrap();
        assert!(matches!(
            caches.descriptor_set(AssetId(2), &assets),
            Err(RenderError::CapacityExceeded { resource: "descriptor cache", .. })
        ));
        assert_eq!(caches.image_count(), 1);
    }
}
