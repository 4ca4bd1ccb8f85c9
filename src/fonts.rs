//! Text measurement and glyph outlines.
//!
//! A [`FontBook`] either holds one loaded TrueType/OpenType face, shaped
//! with `rustybuzz` so Arabic joins and right-to-left runs measure
//! correctly, or falls back to a fixed average-advance heuristic. The
//! heuristic keeps layout deterministic on machines without the font.

use rustybuzz::{Direction, UnicodeBuffer};
use tiny_skia::{Path, PathBuilder};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::error::InputError;

/// Average advance as a fraction of the font size when no face is loaded.
const HEURISTIC_ADVANCE: f32 = 0.5;
const HEURISTIC_ADVANCE_BOLD: f32 = 0.55;

#[derive(Clone)]
struct LoadedFace {
    bytes: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
}

/// Font source for layout and painting.
#[derive(Clone, Default)]
pub struct FontBook {
    face: Option<LoadedFace>,
}

/// A shaped glyph positioned relative to the start of its run, in px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedGlyph {
    pub glyph_id: u16,
    pub x: f32,
    pub y: f32,
}

impl FontBook {
    /// A book with no face; every measurement uses the heuristic.
    pub fn heuristic() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF face from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, InputError> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| InputError::InvalidFont(e.to_string()))?;
        let units_per_em = face.units_per_em().max(1) as f32;
        let ascender = face.ascender() as f32;
        log::debug!(
            "loaded font face: {} glyphs, {} units/em",
            face.number_of_glyphs(),
            units_per_em
        );
        Ok(Self {
            face: Some(LoadedFace {
                bytes,
                units_per_em,
                ascender,
            }),
        })
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    /// Width of `text` in px at `font_size`.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        let Some(face) = &self.face else {
            let avg = if bold {
                HEURISTIC_ADVANCE_BOLD
            } else {
                HEURISTIC_ADVANCE
            };
            return text.chars().count() as f32 * font_size * avg;
        };
        match self.shape(text, font_size) {
            Some((_, advance)) => advance,
            None => {
                log::trace!("shaping failed, measuring with raw advances");
                raw_advance_width(face, text, font_size)
            }
        }
    }

    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Distance from the top of a line box to the baseline, in px.
    pub fn ascender_px(&self, font_size: f32) -> f32 {
        match &self.face {
            Some(face) => face.ascender * font_size / face.units_per_em,
            None => font_size * 0.8,
        }
    }

    /// Shape `text` into positioned glyphs in visual order, returning the
    /// glyphs and the total advance. `None` without a face.
    pub fn shape(&self, text: &str, font_size: f32) -> Option<(Vec<PositionedGlyph>, f32)> {
        let face = self.face.as_ref()?;
        let hb = rustybuzz::Face::from_slice(&face.bytes, 0)?;
        let scale = font_size / face.units_per_em;

        let mut buffer = UnicodeBuffer::new();
        buffer.set_direction(detect_direction(text));
        buffer.push_str(text);
        let output = rustybuzz::shape(&hb, &[], buffer);

        let mut glyphs = Vec::with_capacity(output.len());
        let mut pen_x = 0.0f32;
        for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
            glyphs.push(PositionedGlyph {
                glyph_id: info.glyph_id as u16,
                x: pen_x + pos.x_offset as f32 * scale,
                y: -(pos.y_offset as f32) * scale,
            });
            pen_x += pos.x_advance as f32 * scale;
        }
        Some((glyphs, pen_x))
    }

    /// Outline of one glyph with its origin on the baseline at (`x`, `y`),
    /// in y-down raster coordinates.
    pub fn glyph_path(&self, glyph_id: u16, x: f32, y: f32, font_size: f32) -> Option<Path> {
        let face = self.face.as_ref()?;
        let parsed = ttf_parser::Face::parse(&face.bytes, 0).ok()?;
        let mut builder = GlyphPathBuilder {
            builder: PathBuilder::new(),
            origin_x: x,
            origin_y: y,
            scale: font_size / face.units_per_em,
        };
        parsed.outline_glyph(GlyphId(glyph_id), &mut builder)?;
        builder.builder.finish()
    }
}

fn raw_advance_width(face: &LoadedFace, text: &str, font_size: f32) -> f32 {
    let Ok(parsed) = ttf_parser::Face::parse(&face.bytes, 0) else {
        return text.chars().count() as f32 * font_size * HEURISTIC_ADVANCE;
    };
    let scale = font_size / face.units_per_em;
    text.chars()
        .map(|ch| match parsed.glyph_index(ch) {
            Some(gid) => parsed.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
            None => font_size * HEURISTIC_ADVANCE,
        })
        .sum()
}

/// Right-to-left if the text contains any Hebrew or Arabic code point.
pub fn detect_direction(text: &str) -> Direction {
    let rtl = text.chars().any(|ch| {
        matches!(
            ch as u32,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        )
    });
    if rtl {
        Direction::RightToLeft
    } else {
        Direction::LeftToRight
    }
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    // font units are y-up
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Word-wrap text to fit within `max_width` px. Always returns at least one
/// line; a single word wider than the line is kept whole.
pub fn wrap_text(text: &str, font_size: f32, bold: bool, max_width: f32, fonts: &FontBook) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            let w = fonts.measure_text_width(&candidate, font_size, bold);
            if w > max_width && !current_line.is_empty() {
                lines.push(std::mem::replace(&mut current_line, word.to_string()));
            } else {
                current_line = candidate;
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
