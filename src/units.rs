//! Unit conversion between physical page units (millimetres), raster pixels
//! and PDF points.

use crate::raster::RasterImage;

/// Raster pixels per millimetre at 96 px per inch.
pub const PX_PER_MM: f64 = 96.0 / 25.4;

/// PDF points per millimetre (72 pt per inch).
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// Millimetres → whole raster pixels (rounded, never below 1).
pub fn to_pixels(mm: f64) -> u32 {
    (mm * PX_PER_MM).round().max(1.0) as u32
}

/// Millimetres → PDF points.
pub fn mm_to_pt(mm: f64) -> f32 {
    (mm * PT_PER_MM) as f32
}

/// Height in millimetres of `img` scaled to fit `physical_width` while
/// preserving its aspect ratio.
pub fn scaled_physical_height(img: &RasterImage, physical_width: f64) -> f64 {
    if img.width() == 0 {
        return 0.0;
    }
    img.height() as f64 * physical_width / img.width() as f64
}
