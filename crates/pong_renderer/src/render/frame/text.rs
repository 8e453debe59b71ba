//! Text labels laid out as glyph instances on a monospaced font atlas
//!
//! The atlas is a 16x8 grid whose cells are indexed by ASCII code.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec2;
use crate::render::assets::AssetId;

/// Glyph drawn for characters the atlas does not contain
pub const REPLACEMENT_GLYPH: char = '?';

/// A piece of text and/or a number to draw this frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Label {
    /// Text drawn first, if any
    pub text: Option<String>,
    /// Number drawn after the text, in decimal
    pub number: Option<i32>,
    /// Screen position of the first glyph's top-left corner
    pub position: Vec2,
}

impl Label {
    /// A text-only label
    pub fn text(text: impl Into<String>, position: Vec2) -> Self {
        Self {
            text: Some(text.into()),
            number: None,
            position,
        }
    }

    /// A number-only label
    pub fn number(number: i32, position: Vec2) -> Self {
        Self {
            text: None,
            number: Some(number),
            position,
        }
    }

    /// Append a number after the text
    #[must_use]
    pub fn with_number(mut self, number: i32) -> Self {
        self.number = Some(number);
        self
    }

    /// The characters this label draws
    pub fn content(&self) -> String {
        let mut content = self.text.clone().unwrap_or_default();
        if let Some(number) = self.number {
            content.push_str(&number.to_string());
        }
        content
    }
}

/// Font and metrics used for every label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font atlas asset
    pub font: AssetId,
    /// Material tinting the glyphs
    pub material_index: u32,
    /// Horizontal cursor advance per character in pixels
    pub glyph_advance: f32,
    /// Vertical cursor advance per newline in pixels
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: AssetId(3),
            material_index: 0,
            glyph_advance: 15.0,
            line_height: 30.0,
        }
    }
}

/// One glyph instance: an atlas cell at a screen position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Atlas cell, i.e. the ASCII code
    pub frame: u32,
    /// Top-left corner on screen
    pub position: Vec2,
}

/// Atlas cell for `c`
pub fn glyph_frame(c: char) -> u32 {
    if c.is_ascii() {
        c as u32
    } else {
        REPLACEMENT_GLYPH as u32
    }
}

/// Lay out `label` into glyph instances.
///
/// Spaces advance the cursor without producing a glyph; newlines return it to
/// the label's left edge one line further down.
pub fn layout(label: &Label, style: &TextStyle) -> Vec<Glyph> {
    let mut glyphs = Vec::new();
    let mut cursor = label.position;

    for c in label.content().chars() {
        match c {
            '\n' => {
                cursor.x = label.position.x;
                cursor.y += style.line_height;
            }
            ' ' => cursor.x += style.glyph_advance,
            _ => {
                glyphs.push(Glyph {
                    frame: glyph_frame(c),
                    position: cursor,
                });
                cursor.x += style.glyph_advance;
            }
        }
    }

    glyphs
}

/// Width in pixels of the widest line of `text`
pub fn text_width(text: &str, style: &TextStyle) -> f32 {
    text.split('\n')
        .map(|line| line.chars().count() as f32 * style.glyph_advance)
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_glyphs_advance_horizontally() {
        let glyphs = layout(&Label::text("AB", Vec2::new(100.0, 50.0)), &TextStyle::default());

        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].frame, 'A' as u32);
        assert_relative_eq!(glyphs[1].position.x, 115.0);
        assert_relative_eq!(glyphs[1].position.y, 50.0);
    }

    #[test]
    fn test_space_emits_no_glyph() {
        let glyphs = layout(&Label::text("A B", Vec2::zeros()), &TextStyle::default());

        assert_eq!(glyphs.len(), 2);
        assert_relative_eq!(glyphs[1].position.x, 30.0);
    }

    #[test]
    fn test_newline_returns_to_left_edge() {
        let glyphs = layout(&Label::text("AB\nC", Vec2::new(10.0, 20.0)), &TextStyle::default());

        assert_eq!(glyphs.len(), 3);
        assert_relative_eq!(glyphs[2].position.x, 10.0);
        assert_relative_eq!(glyphs[2].position.y, 50.0);
    }

    #[test]
    fn test_number_follows_text() {
        let label = Label::text("P1 ", Vec2::zeros()).with_number(-12);
        assert_eq!(label.content(), "P1 -12");

        let frames: Vec<u32> = layout(&label, &TextStyle::default()).iter().map(|g| g.frame).collect();
        assert_eq!(frames, vec!['P' as u32, '1' as u32, '-' as u32, '1' as u32, '2' as u32]);
    }

    #[test]
    fn test_empty_label_draws_nothing() {
        let label = Label {
            text: None,
            number: None,
            position: Vec2::zeros(),
        };
        assert!(layout(&label, &TextStyle::default()).is_empty());
    }

    #[test]
    fn test_non_ascii_uses_replacement() {
        assert_eq!(glyph_frame('é'), '?' as u32);
        assert_eq!(glyph_frame('0'), 48);
    }

    #[test]
    fn test_text_width_uses_widest_line() {
        let style = TextStyle::default();

        assert_relative_eq!(text_width("PONG", &style), 60.0);
        assert_relative_eq!(text_width("A\nWIDE", &style), 60.0);
        assert_relative_eq!(text_width("", &style), 0.0);
    }
}
