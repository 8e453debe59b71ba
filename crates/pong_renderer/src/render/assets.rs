//! Asset identifiers, raw pixel data and sprite-sheet metadata
//!
//! Decoding files is the asset collaborator's job; the renderer only sees RGBA8
//! pixels and the grid each sheet is cut into.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::render::error::{RenderError, RenderResult};

/// Bytes per pixel of every uploaded image (`R8G8B8A8_UNORM`)
pub const BYTES_PER_PIXEL: usize = 4;

/// Identifies a sprite sheet known to the asset collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Raw RGBA8 pixels handed over by the asset collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetData {
    /// Tightly packed rows of RGBA8 pixels
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl AssetData {
    /// Wrap decoded pixels
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self { pixels, width, height }
    }

    /// Number of bytes an image of this size must contain
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Reject empty, zero-sized or truncated data before it reaches the GPU
    pub fn validate(&self, asset: AssetId) -> RenderResult<()> {
        if self.pixels.is_empty() {
            return Err(RenderError::InvalidAsset {
                asset,
                reason: "zero bytes of pixel data".to_string(),
            });
        }

        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidAsset {
                asset,
                reason: format!("zero-sized image {}x{}", self.width, self.height),
            });
        }

        if self.pixels.len() < self.expected_len() {
            return Err(RenderError::InvalidAsset {
                asset,
                reason: format!(
                    "{} bytes of pixel data for a {}x{} image, expected {}",
                    self.pixels.len(),
                    self.width,
                    self.height,
                    self.expected_len()
                ),
            });
        }

        Ok(())
    }
}

/// Texture-space rectangle of one sprite-sheet cell
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UvRect {
    /// V coordinate of the top edge
    pub top: f32,
    /// V coordinate of the bottom edge
    pub bottom: f32,
    /// U coordinate of the left edge
    pub left: f32,
    /// U coordinate of the right edge
    pub right: f32,
}

/// Pixel size of a sheet and of a single animation cell within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteSheet {
    /// Full sheet width in pixels
    pub width: u32,
    /// Full sheet height in pixels
    pub height: u32,
    /// Width of one cell in pixels
    pub cell_width: u32,
    /// Height of one cell in pixels
    pub cell_height: u32,
}

impl SpriteSheet {
    /// A sheet holding a single image
    pub const fn single(width: u32, height: u32) -> Self {
        Self::grid(width, height, width, height)
    }

    /// A sheet cut into a grid of equally sized cells
    pub const fn grid(width: u32, height: u32, cell_width: u32, cell_height: u32) -> Self {
        Self {
            width,
            height,
            cell_width,
            cell_height,
        }
    }

    /// Number of cells per row
    pub fn columns(&self) -> u32 {
        (self.width / self.cell_width.max(1)).max(1)
    }

    /// Number of cell rows
    pub fn rows(&self) -> u32 {
        (self.height / self.cell_height.max(1)).max(1)
    }

    /// Pixel size of one cell, used as the on-screen size of a sprite
    pub fn cell_size(&self) -> (f32, f32) {
        (self.cell_width as f32, self.cell_height as f32)
    }

    /// UV rectangle of an animation frame, counting cells row-major from the top left.
    ///
    /// Frames past the last cell wrap around.
    pub fn uv_rect(&self, frame: u32) -> UvRect {
        let columns = self.columns();
        let frame = frame % (columns * self.rows());
        let row = frame / columns;
        let column = frame % columns;

        let cell_u = self.cell_width as f32 / self.width.max(1) as f32;
        let cell_v = self.cell_height as f32 / self.height.max(1) as f32;

        let top = row as f32 * cell_v;
        let left = column as f32 * cell_u;

        UvRect {
            top,
            bottom: top + cell_v,
            left,
            right: left + cell_u,
        }
    }
}

/// Asset collaborator: yields pixel data and sheet layout for an identifier
pub trait AssetSource {
    /// Decode the asset; ownership of the pixels passes to the renderer.
    /// `None` means the asset does not exist.
    fn load(&self, asset: AssetId) -> Option<AssetData>;

    /// Static layout of the asset's sprite sheet
    fn sprite_sheet(&self, asset: AssetId) -> SpriteSheet;
}

/// Sprite-sheet metadata, queried from the collaborator once per asset
#[derive(Debug, Default)]
pub struct SpriteSheets {
    sheets: HashMap<AssetId, SpriteSheet>,
}

impl SpriteSheets {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Sheet layout for `asset`, asking the collaborator on first use
    pub fn get(&mut self, asset: AssetId, source: &dyn AssetSource) -> SpriteSheet {
        *self
            .sheets
            .entry(asset)
            .or_insert_with(|| source.sprite_sheet(asset))
    }

    /// Number of sheets queried so far
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Whether no sheet has been queried yet
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    const FONT_ATLAS: SpriteSheet = SpriteSheet::grid(240, 240, 15, 30);

    #[test]
    fn test_font_atlas_grid() {
        assert_eq!(FONT_ATLAS.columns(), 16);
        assert_eq!(FONT_ATLAS.rows(), 8);
    }

    #[test]
    fn test_frame_17_maps_to_second_row_second_column() {
        let uv = FONT_ATLAS.uv_rect(17);

        assert_relative_eq!(uv.left, 1.0 / 16.0);
        assert_relative_eq!(uv.right, 2.0 / 16.0);
        assert_relative_eq!(uv.top, 1.0 / 8.0);
        assert_relative_eq!(uv.bottom, 2.0 / 8.0);
    }

    #[test]
    fn test_single_image_covers_whole_texture() {
        let uv = SpriteSheet::single(50, 100).uv_rect(0);
        assert_eq!(uv, UvRect { top: 0.0, bottom: 1.0, left: 0.0, right: 1.0 });
    }

    #[test]
    fn test_frames_wrap_past_last_cell() {
        assert_eq!(FONT_ATLAS.uv_rect(128 + 17), FONT_ATLAS.uv_rect(17));
    }

    #[test]
    fn test_zero_cell_size_degrades_to_single_cell() {
        let sheet = SpriteSheet::grid(64, 64, 0, 0);
        assert_eq!(sheet.columns(), 1);
        assert_eq!(sheet.rows(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_bytes() {
        let data = AssetData::new(Vec::new(), 4, 4);
        assert!(matches!(
            data.validate(AssetId(1)),
            Err(RenderError::InvalidAsset { asset: AssetId(1), .. })
        ));
    }

    #[test]
    fn test_validate_rejects_truncated_pixels() {
        let data = AssetData::new(vec![255; 15], 2, 2);
        assert!(data.validate(AssetId(2)).is_err());

        let data = AssetData::new(vec![255; 16], 2, 2);
        assert!(data.validate(AssetId(2)).is_ok());
    }

    struct CountingSource {
        queries: Cell<u32>,
    }

    impl AssetSource for CountingSource {
        fn load(&self, _asset: AssetId) -> Option<AssetData> {
            None
        }

        fn sprite_sheet(&self, _asset: AssetId) -> SpriteSheet {
            self.queries.set(self.queries.get() + 1);
            FONT_ATLAS
        }
    }

    #[test]
    fn test_sprite_sheets_query_once_per_asset() {
        let source = CountingSource { queries: Cell::new(0) };
        let mut sheets = SpriteSheets::new();

        for _ in 0..3 {
            assert_eq!(sheets.get(AssetId(3), &source), FONT_ATLAS);
        }
        sheets.get(AssetId(4), &source);

        assert_eq!(source.queries.get(), 2);
        assert_eq!(sheets.len(), 2);
    }
}
