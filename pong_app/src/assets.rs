//! Pong sprites: PNG files when present, generated pixels otherwise

use std::path::{Path, PathBuf};

use pong_renderer::prelude::*;

/// Solid white 1x1 texture, tinted by its material
pub const WHITE: AssetId = AssetId(0);
/// Round ball
pub const BALL: AssetId = AssetId(1);
/// Paddle
pub const PADDLE: AssetId = AssetId(2);
/// 16x8 monospaced font atlas indexed by ASCII code
pub const FONT: AssetId = AssetId(3);

const BALL_SIZE: u32 = 50;
const PADDLE_SIZE: (u32, u32) = (50, 100);
const GLYPH_CELL: (u32, u32) = (15, 30);
const FONT_ATLAS_SIZE: u32 = 240;

// Generated glyphs are 3x5 dots, each dot a 4x4 pixel block
const DOT: u32 = 4;
const GLYPH_OFFSET: (u32, u32) = (1, 5);

#[derive(Debug, thiserror::Error)]
enum AssetError {
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image is {actual:?}, expected {expected:?}")]
    WrongSize { actual: (u32, u32), expected: (u32, u32) },
}

/// Loads `<root>/<name>.png` for each sprite, generating it if the file is missing
#[derive(Debug, Clone)]
pub struct PongAssets {
    root: PathBuf,
}

impl PongAssets {
    /// Look for sprite files under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_name(asset: AssetId) -> Option<&'static str> {
        match asset {
            BALL => Some("ball.png"),
            PADDLE => Some("paddle.png"),
            FONT => Some("font.png"),
            _ => None,
        }
    }

    fn load_png(path: &Path, expected: (u32, u32)) -> Result<AssetData, AssetError> {
        let image = image::open(path)?.to_rgba8();
        let actual = image.dimensions();
        if actual != expected {
            return Err(AssetError::WrongSize { actual, expected });
        }
        Ok(AssetData::new(image.into_raw(), actual.0, actual.1))
    }

    fn generate(asset: AssetId) -> Option<AssetData> {
        match asset {
            WHITE => Some(AssetData::new(vec![255; 4], 1, 1)),
            BALL => Some(generate_ball()),
            PADDLE => Some(filled(PADDLE_SIZE.0, PADDLE_SIZE.1)),
            FONT => Some(generate_font_atlas()),
            _ => None,
        }
    }
}

impl AssetSource for PongAssets {
    fn load(&self, asset: AssetId) -> Option<AssetData> {
        if let Some(name) = Self::file_name(asset) {
            let path = self.root.join(name);
            if path.exists() {
                let sheet = self.sprite_sheet(asset);
                match Self::load_png(&path, (sheet.width, sheet.height)) {
                    Ok(data) => return Some(data),
                    Err(e) => log::warn!("Ignoring {}: {e}", path.display()),
                }
            }
        }

        log::debug!("Generating pixels for asset {asset}");
        Self::generate(asset)
    }

    fn sprite_sheet(&self, asset: AssetId) -> SpriteSheet {
        match asset {
            BALL => SpriteSheet::single(BALL_SIZE, BALL_SIZE),
            PADDLE => SpriteSheet::single(PADDLE_SIZE.0, PADDLE_SIZE.1),
            FONT => SpriteSheet::grid(FONT_ATLAS_SIZE, FONT_ATLAS_SIZE, GLYPH_CELL.0, GLYPH_CELL.1),
            _ => SpriteSheet::single(1, 1),
        }
    }
}

fn filled(width: u32, height: u32) -> AssetData {
    AssetData::new(vec![255; (width * height * 4) as usize], width, height)
}

fn generate_ball() -> AssetData {
    let radius = BALL_SIZE as f32 / 2.0;
    let mut pixels = Vec::with_capacity((BALL_SIZE * BALL_SIZE * 4) as usize);

    for y in 0..BALL_SIZE {
        for x in 0..BALL_SIZE {
            let dx = x as f32 + 0.5 - radius;
            let dy = y as f32 + 0.5 - radius;
            let alpha = if dx * dx + dy * dy <= radius * radius { 255 } else { 0 };
            pixels.extend_from_slice(&[255, 255, 255, alpha]);
        }
    }

    AssetData::new(pixels, BALL_SIZE, BALL_SIZE)
}

fn generate_font_atlas() -> AssetData {
    let mut pixels = vec![0u8; (FONT_ATLAS_SIZE * FONT_ATLAS_SIZE * 4) as usize];
    let columns = FONT_ATLAS_SIZE / GLYPH_CELL.0;

    for code in 0..128u8 {
        let Some(rows) = glyph_dots(char::from(code).to_ascii_uppercase()) else {
            continue;
        };
        let cell_x = u32::from(code) % columns * GLYPH_CELL.0 + GLYPH_OFFSET.0;
        let cell_y = u32::from(code) / columns * GLYPH_CELL.1 + GLYPH_OFFSET.1;

        for (row, bits) in (0u32..).zip(rows) {
            for column in 0..3u32 {
                if bits & (0b100 >> column) == 0 {
                    continue;
                }
                for y in 0..DOT {
                    for x in 0..DOT {
                        let px = cell_x + column * DOT + x;
                        let py = cell_y + row * DOT + y;
                        let offset = ((py * FONT_ATLAS_SIZE + px) * 4) as usize;
                        pixels[offset..offset + 4].copy_from_slice(&[255; 4]);
                    }
                }
            }
        }
    }

    AssetData::new(pixels, FONT_ATLAS_SIZE, FONT_ATLAS_SIZE)
}

/// 3x5 dot pattern of a glyph, top row first, leftmost dot in bit 2
fn glyph_dots(c: char) -> Option<[u8; 5]> {
    let rows = match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '?' => [0b111, 0b001, 0b010, 0b000, 0b010],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets() -> PongAssets {
        let dir = std::env::temp_dir().join("pong-assets-that-do-not-exist");
        PongAssets::new(dir)
    }

    fn cell_is_blank(atlas: &AssetData, code: u32) -> bool {
        let x0 = code % 16 * GLYPH_CELL.0;
        let y0 = code / 16 * GLYPH_CELL.1;

        (y0..y0 + GLYPH_CELL.1).all(|y| {
            (x0..x0 + GLYPH_CELL.0).all(|x| atlas.pixels[((y * atlas.width + x) * 4 + 3) as usize] == 0)
        })
    }

    #[test]
    fn test_generated_sizes_match_sheets() {
        let assets = assets();

        for asset in [WHITE, BALL, PADDLE, FONT] {
            let data = assets.load(asset).unwrap();
            let sheet = assets.sprite_sheet(asset);

            assert_eq!((data.width, data.height), (sheet.width, sheet.height));
            assert!(data.validate(asset).is_ok());
        }
    }

    #[test]
    fn test_unknown_asset_has_no_data() {
        assert!(assets().load(AssetId(42)).is_none());
    }

    #[test]
    fn test_font_atlas_glyphs() {
        let atlas = assets().load(FONT).unwrap();

        assert!(!cell_is_blank(&atlas, '7' as u32));
        assert!(!cell_is_blank(&atlas, 'p' as u32));
        assert!(cell_is_blank(&atlas, ' ' as u32));
    }

    #[test]
    fn test_ball_corners_are_transparent() {
        let ball = assets().load(BALL).unwrap();
        let center = ((25 * BALL_SIZE + 25) * 4 + 3) as usize;

        assert_eq!(ball.pixels[3], 0);
        assert_eq!(ball.pixels[center], 255);
    }
}
