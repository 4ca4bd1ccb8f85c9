//! Off-screen rasterization of content blocks.
//!
//! [`HtmlRasterizer`] parses a block's markup, lays it out at the requested
//! pixel width and paints it with `tiny-skia` onto an opaque white surface.
//! The paint surface is borrowed from a [`RenderSurface`] through a scoped
//! guard, so its buffer is handed back on every exit path, including errors.

use std::ops::{Deref, DerefMut};

use image::{ImageFormat, RgbImage, RgbaImage};
use tiny_skia::{
    FillRule, FilterQuality, IntSize, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect,
    Stroke, Transform,
};

use crate::content::ContentBlock;
use crate::error::RenderError;
use crate::fonts::FontBook;
use crate::layout::{compute_block_layout, BoxContent, PositionedBox};
use crate::markup::parse_markup;
use crate::style::{build_styled_tree, Color, ComputedStyle, TextAlign};

/// An opaque RGB raster of one rendered block.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: RgbImage,
}

impl RasterImage {
    /// A white image of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])),
        }
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Lossless PNG encoding.
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Vec::new();
        self.pixels
            .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }
}

/// Turns a content block laid out at `target_px_width` layout pixels into a
/// raster. The raster may be supersampled; only its aspect ratio matters to
/// page placement.
pub trait Rasterizer {
    fn render(&mut self, block: &ContentBlock, target_px_width: u32) -> Result<RasterImage, RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Device pixels per layout pixel. Raises resolution only; wrapping and
    /// the block's physical height are unaffected.
    pub scale: f32,
    /// Largest surface, in pixels, the rasterizer will allocate.
    pub max_surface_px: u64,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            max_surface_px: 64 * 1024 * 1024,
        }
    }
}

/// Owner of the paint buffer, reused across blocks.
#[derive(Debug, Default)]
pub struct RenderSurface {
    spare: Vec<u8>,
    max_px: u64,
}

impl RenderSurface {
    pub fn new(max_px: u64) -> Self {
        Self {
            spare: Vec::new(),
            max_px,
        }
    }

    /// Borrow a cleared surface of `width` × `height`. The buffer returns
    /// to this owner when the guard is dropped.
    pub fn acquire(&mut self, width: u32, height: u32) -> Result<SurfaceGuard<'_>, RenderError> {
        let too_big = RenderError::Surface { width, height };
        if width as u64 * height as u64 > self.max_px {
            return Err(too_big);
        }
        let size = IntSize::from_wh(width, height).ok_or_else(|| too_big.clone())?;
        let mut data = std::mem::take(&mut self.spare);
        data.clear();
        data.resize(width as usize * height as usize * 4, 0);
        let pixmap = Pixmap::from_vec(data, size).ok_or(too_big)?;
        Ok(SurfaceGuard {
            pixmap: Some(pixmap),
            home: &mut self.spare,
        })
    }
}

pub struct SurfaceGuard<'a> {
    pixmap: Option<Pixmap>,
    home: &'a mut Vec<u8>,
}

impl Deref for SurfaceGuard<'_> {
    type Target = Pixmap;

    fn deref(&self) -> &Pixmap {
        // only None during drop
        self.pixmap.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for SurfaceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Pixmap {
        self.pixmap.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        if let Some(pixmap) = self.pixmap.take() {
            *self.home = pixmap.take();
        }
    }
}

/// The markup rasterizer used in production.
pub struct HtmlRasterizer {
    fonts: FontBook,
    options: RasterOptions,
    surface: RenderSurface,
    warned_no_font: bool,
}

impl HtmlRasterizer {
    pub fn new(fonts: FontBook, options: RasterOptions) -> Self {
        Self {
            surface: RenderSurface::new(options.max_surface_px),
            fonts,
            options,
            warned_no_font: false,
        }
    }
}

impl Default for HtmlRasterizer {
    fn default() -> Self {
        Self::new(FontBook::heuristic(), RasterOptions::default())
    }
}

impl Rasterizer for HtmlRasterizer {
    fn render(&mut self, block: &ContentBlock, target_px_width: u32) -> Result<RasterImage, RenderError> {
        let scale = if self.options.scale > 0.0 {
            self.options.scale
        } else {
            1.0
        };
        let nodes = parse_markup(block.markup())?;
        let styled = build_styled_tree(&nodes, None);
        let layout_width = target_px_width.max(1);
        let layout = compute_block_layout(&styled, layout_width as f32, &self.fonts)?;

        if !self.fonts.has_face() && !self.warned_no_font {
            log::warn!("no font loaded; text is drawn as placeholder bars");
            self.warned_no_font = true;
        }

        let width = (layout_width as f32 * scale).round().max(1.0) as u32;
        // effective factor after rounding the width, applied to both axes
        let device_scale = width as f32 / layout_width as f32;
        let height = (layout.height * device_scale).ceil().max(1.0) as u32;
        log::trace!("{}: {}x{} px at scale {scale}", block.role(), width, height);

        let mut surface = self.surface.acquire(width, height)?;
        surface.fill(tiny_skia::Color::WHITE);
        let painter = Painter {
            fonts: &self.fonts,
            transform: Transform::from_scale(device_scale, device_scale),
        };
        for b in &layout.boxes {
            painter.paint_box(&mut surface, b);
        }
        Ok(to_raster(&surface))
    }
}

/// Drop alpha from an opaque premultiplied surface.
fn to_raster(pixmap: &Pixmap) -> RasterImage {
    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    match RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb) {
        Some(img) => RasterImage::from_rgb(img),
        None => RasterImage::blank(pixmap.width(), pixmap.height()),
    }
}

struct Painter<'a> {
    fonts: &'a FontBook,
    transform: Transform,
}

impl Painter<'_> {
    fn paint_box(&self, pixmap: &mut Pixmap, b: &PositionedBox) {
        let s = &b.style;
        let radius = s.border_radius.resolve(b.width, b.height);

        if !s.background_color.is_transparent() {
            if let Some(path) = rounded_rect(b.x, b.y, b.width, b.height, radius) {
                pixmap.fill_path(&path, &paint_for(s.background_color), FillRule::Winding, self.transform, None);
            }
        }
        self.paint_border(pixmap, b, radius);

        match &b.content {
            BoxContent::None => {}
            BoxContent::Text { lines } => self.paint_text(pixmap, b, lines),
            BoxContent::Image { pixels } => self.paint_image(pixmap, b, pixels),
        }

        for child in &b.children {
            self.paint_box(pixmap, child);
        }
    }

    fn paint_border(&self, pixmap: &mut Pixmap, b: &PositionedBox, radius: f32) {
        let s = &b.style;
        if s.border.is_zero() || s.border_color.is_transparent() {
            return;
        }
        let paint = paint_for(s.border_color);
        if s.border.is_uniform() && radius > 0.0 {
            let w = s.border.top;
            let inset = w / 2.0;
            if let Some(path) = rounded_rect(
                b.x + inset,
                b.y + inset,
                b.width - w,
                b.height - w,
                (radius - inset).max(0.0),
            ) {
                let stroke = Stroke {
                    width: w,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint, &stroke, self.transform, None);
            }
            return;
        }
        let e = s.border;
        let sides = [
            (b.x, b.y, b.width, e.top),
            (b.x, b.y + b.height - e.bottom, b.width, e.bottom),
            (b.x, b.y, e.left, b.height),
            (b.x + b.width - e.right, b.y, e.right, b.height),
        ];
        for (x, y, w, h) in sides {
            if let Some(rect) = Rect::from_xywh(x, y, w, h) {
                pixmap.fill_rect(rect, &paint, self.transform, None);
            }
        }
    }

    fn paint_text(&self, pixmap: &mut Pixmap, b: &PositionedBox, lines: &[crate::layout::TextLine]) {
        let s = &b.style;
        let line_height = self.fonts.line_height_px(s.font_size, s.line_height);
        let paint = paint_for(s.color);

        for (i, line) in lines.iter().enumerate() {
            let top = b.y + i as f32 * line_height;
            let x = line_x(s, b, line.width);

            let Some((glyphs, _)) = self.fonts.shape(&line.text, s.font_size) else {
                // greeked placeholder: a bar covering the x-height band
                let bar_h = s.font_size * 0.5;
                let bar_y = top + (line_height - bar_h) / 2.0;
                if let Some(rect) = Rect::from_xywh(x, bar_y, line.width, bar_h) {
                    pixmap.fill_rect(rect, &paint_for(s.color.with_alpha(0.35)), self.transform, None);
                }
                continue;
            };

            let baseline =
                top + (line_height - s.font_size) / 2.0 + self.fonts.ascender_px(s.font_size);
            let slant = if s.is_italic() {
                Transform::from_row(1.0, 0.0, -0.2, 1.0, 0.2 * baseline, 0.0)
            } else {
                Transform::identity()
            };
            let transform = self.transform.pre_concat(slant);
            for g in glyphs {
                let Some(path) = self.fonts.glyph_path(g.glyph_id, x + g.x, baseline + g.y, s.font_size) else {
                    continue;
                };
                pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                if s.is_bold() {
                    let stroke = Stroke {
                        width: s.font_size / 24.0,
                        ..Stroke::default()
                    };
                    pixmap.stroke_path(&path, &paint, &stroke, transform, None);
                }
            }
        }
    }

    fn paint_image(&self, pixmap: &mut Pixmap, b: &PositionedBox, pixels: &RgbaImage) {
        let Some(src) = premultiplied_pixmap(pixels) else {
            return;
        };
        let sx = b.width / src.width() as f32;
        let sy = b.height / src.height() as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let transform = self.transform.pre_translate(b.x, b.y).pre_scale(sx, sy);
        pixmap.draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);
    }
}

fn line_x(s: &ComputedStyle, b: &PositionedBox, line_width: f32) -> f32 {
    match s.text_align {
        TextAlign::Left => b.x,
        TextAlign::Center => b.x + (b.width - line_width) / 2.0,
        TextAlign::Right => b.x + b.width - line_width,
    }
}

fn paint_for(c: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(
        channel(c.r),
        channel(c.g),
        channel(c.b),
        channel(c.a),
    );
    paint.anti_alias = true;
    paint
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn premultiplied_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(img.width(), img.height())?;
    let mut data = img.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size)
}

/// Rectangle path with circular corners approximated by cubic curves.
fn rounded_rect(x: f32, y: f32, w: f32, h: f32, r: f32) -> Option<Path> {
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    if r <= 0.0 {
        return Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect);
    }
    let r = r.min(w / 2.0).min(h / 2.0);
    let k = r * 0.552_284_8;
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}
