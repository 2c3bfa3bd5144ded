//! Image utilities for page composition
//!
//! Everything that touches RGBA pixels lives here: loading, pixmap
//! conversion, cropping, resizing and the rotation shared by crops and masks.

use image::imageops::{self, FilterType};
use image::io::Reader as ImageReader;
use image::{Rgba, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiny_skia::Pixmap;

use crate::error::{GeneratorError, GeneratorResult};
use crate::mask::{LabelMask, BACKGROUND};
use crate::types::{Color, Rect};

/// Load an image from file path and convert it to RGBA
pub fn load_image(path: &Path) -> GeneratorResult<RgbaImage> {
    if !path.exists() {
        return Err(GeneratorError::ImageError(format!(
            "Image file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let img = ImageReader::new(BufReader::new(file))
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            GeneratorError::ImageError(format!("Failed to decode image {}: {}", path.display(), e))
        })?;

    Ok(img.to_rgba8())
}

/// Convert a premultiplied tiny-skia pixmap into a straight-alpha RGBA image
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

/// Tight bounding box of every pixel with non-zero alpha
pub fn ink_bounds(pixmap: &Pixmap) -> Option<Rect> {
    let width = pixmap.width();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (i, px) in pixmap.pixels().iter().enumerate() {
        if px.alpha() == 0 {
            continue;
        }
        let x = i as u32 % width;
        let y = i as u32 / width;
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

pub fn crop_rgba(img: &RgbaImage, rect: Rect) -> RgbaImage {
    imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Smooth resize for visible pixels (masks use `LabelMask::resize_nearest`)
pub fn resize_rgba(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(img, width, height, FilterType::Triangle)
}

/// Fill `rect` (clipped to the image) with an opaque colour
pub fn fill_rect_rgba(img: &mut RgbaImage, rect: Rect, color: Color) {
    let x_end = rect.right().min(img.width());
    let y_end = rect.bottom().min(img.height());
    for y in rect.y.min(y_end)..y_end {
        for x in rect.x.min(x_end)..x_end {
            img.put_pixel(x, y, color.to_rgba(255));
        }
    }
}

/// Alpha-composite `top` over `bottom` at `(x, y)`, using `top`'s own alpha as paste mask
pub fn composite(bottom: &mut RgbaImage, top: &RgbaImage, x: u32, y: u32) {
    imageops::overlay(bottom, top, x as i64, y as i64);
}

/// Counter-clockwise rotation about the crop centre with an expanded canvas.
///
/// One plan is built per crop and applied to both the visible pixels and the
/// label mask, so both land on the same canvas through the same inverse map.
#[derive(Debug, Clone, Copy)]
pub struct RotationPlan {
    pub angle: f32,
    pub src_width: u32,
    pub src_height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    cos: f64,
    sin: f64,
}

impl RotationPlan {
    pub fn new(angle: f32, src_width: u32, src_height: u32) -> Self {
        let radians = (angle as f64).to_radians();
        let (sin, cos) = radians.sin_cos();
        let w = src_width as f64;
        let h = src_height as f64;
        let expand = |v: f64| ((v - 1e-6).ceil().max(1.0)) as u32;
        Self {
            angle,
            src_width,
            src_height,
            dst_width: expand(w * cos.abs() + h * sin.abs()),
            dst_height: expand(w * sin.abs() + h * cos.abs()),
            cos,
            sin,
        }
    }

    /// Source-space position (continuous, pixel-centre convention) of the
    /// centre of destination pixel `(dx, dy)`
    pub fn source_point(&self, dx: u32, dy: u32) -> (f64, f64) {
        let u = dx as f64 + 0.5 - self.dst_width as f64 / 2.0;
        let v = dy as f64 + 0.5 - self.dst_height as f64 / 2.0;
        let su = u * self.cos - v * self.sin;
        let sv = u * self.sin + v * self.cos;
        (
            su + self.src_width as f64 / 2.0,
            sv + self.src_height as f64 / 2.0,
        )
    }

    /// Bilinear rotation in premultiplied space; outside the source is transparent
    pub fn rotate_rgba(&self, img: &RgbaImage) -> RgbaImage {
        let mut out = RgbaImage::new(self.dst_width, self.dst_height);
        for dy in 0..self.dst_height {
            for dx in 0..self.dst_width {
                let (sx, sy) = self.source_point(dx, dy);
                out.put_pixel(dx, dy, sample_bilinear(img, sx - 0.5, sy - 0.5));
            }
        }
        out
    }

    /// Nearest-neighbour rotation; outside the source is background
    pub fn rotate_labels(&self, mask: &LabelMask) -> LabelMask {
        let mut out = LabelMask::new(self.dst_width, self.dst_height, mask.classes());
        for dy in 0..self.dst_height {
            for dx in 0..self.dst_width {
                let (sx, sy) = self.source_point(dx, dy);
                if sx < 0.0 || sy < 0.0 {
                    continue;
                }
                let (sx, sy) = (sx as u32, sy as u32);
                if sx < mask.width() && sy < mask.height() {
                    let label = mask.get(sx, sy);
                    if label != BACKGROUND {
                        out.set(dx, dy, label);
                    }
                }
            }
        }
        out
    }
}

fn sample_bilinear(img: &RgbaImage, fx: f64, fy: f64) -> Rgba<u8> {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f64; 4];
    let taps = [
        (x0, y0, (1.0 - tx) * (1.0 - ty)),
        (x0 + 1, y0, tx * (1.0 - ty)),
        (x0, y0 + 1, (1.0 - tx) * ty),
        (x0 + 1, y0 + 1, tx * ty),
    ];
    for (x, y, weight) in taps {
        if weight == 0.0 || x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
            continue;
        }
        let px = img.get_pixel(x as u32, y as u32);
        let alpha = px[3] as f64 / 255.0;
        acc[0] += weight * px[0] as f64 * alpha;
        acc[1] += weight * px[1] as f64 * alpha;
        acc[2] += weight * px[2] as f64 * alpha;
        acc[3] += weight * alpha;
    }

    if acc[3] <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let unpremultiply = |c: f64| (c / acc[3]).round().clamp(0.0, 255.0) as u8;
    Rgba([
        unpremultiply(acc[0]),
        unpremultiply(acc[1]),
        unpremultiply(acc[2]),
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
