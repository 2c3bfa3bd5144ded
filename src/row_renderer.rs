//! RowRenderer – rasterizes one line of text together with its class mask
//!
//! Glyphs are drawn at a fixed reference size. Each glyph is also rendered
//! alone to find its ink box, and that box is stamped into the mask with the
//! glyph's class label at the same pen position. The finished row is cropped
//! to the union of all ink boxes and scaled to the requested height; pixels
//! are resampled smoothly, labels with nearest neighbour.

use image::RgbaImage;
use rand::Rng;
use std::sync::Arc;
use tiny_skia::{FillRule, Paint, Path as SkPath, Pixmap, Stroke, Transform};

use crate::config::RowConfig;
use crate::error::{GeneratorError, GeneratorResult};
use crate::font_utils::{FontPool, GlyphFont, ScaledFont};
use crate::image_utils::{crop_rgba, ink_bounds, pixmap_to_rgba, resize_rgba};
use crate::mask::LabelMask;
use crate::text_source::TextSource;
use crate::types::{Color, Rect};

/// Reference size glyphs are rasterized at before the final rescale
pub const BASE_FONT_SIZE: f32 = 50.0;

/// Extra room below the ink box so descenders survive the crop
const BOTTOM_MARGIN: f32 = 1.05;

/// Horizontal slack around a glyph rendered alone (negative bearings, bold outline)
const GLYPH_PAD: u32 = 8;

/// Font, size and colour of one row
#[derive(Clone, Debug)]
pub struct RowStyle {
    pub font: Arc<dyn GlyphFont>,
    /// Target text height in pixels
    pub size: f32,
    pub color: Color,
    pub bold: bool,
}

/// A rendered row: straight-alpha pixels and a congruent label mask
#[derive(Debug, Clone)]
pub struct RowCrop {
    pub image: RgbaImage,
    pub mask: LabelMask,
    pub text: String,
}

pub struct RowRenderer {
    alphabet: Vec<char>,
    fonts: FontPool,
    text_source: TextSource,
    font_size: [f32; 2],
    font_color_range: [[u8; 2]; 3],
    bold_probability: f64,
}

impl RowRenderer {
    pub fn new(
        alphabet: &str,
        fonts: FontPool,
        text_source: TextSource,
        config: &RowConfig,
    ) -> GeneratorResult<Self> {
        if alphabet.is_empty() {
            return Err(GeneratorError::Config("alphabet must not be empty".to_string()));
        }
        Ok(Self {
            alphabet: alphabet.chars().collect(),
            fonts,
            text_source,
            font_size: config.font_size,
            font_color_range: config.font_color_range,
            bold_probability: config.bold_probability,
        })
    }

    /// Channel count of the masks this renderer produces
    pub fn classes(&self) -> u16 {
        self.alphabet.len() as u16 + 1
    }

    pub fn fonts(&self) -> &FontPool {
        &self.fonts
    }

    pub fn text_source(&self) -> &TextSource {
        &self.text_source
    }

    /// Mask channel of `ch`: its alphabet position plus one, `None` outside the alphabet
    pub fn class_code(&self, ch: char) -> Option<u16> {
        self.alphabet
            .iter()
            .position(|&c| c == ch)
            .map(|i| i as u16 + 1)
    }

    pub fn random_style<R: Rng + ?Sized>(&self, rng: &mut R) -> RowStyle {
        let [lo, hi] = self.font_size;
        let channel = |rng: &mut R, [a, b]: [u8; 2]| rng.gen_range(a.min(b)..=a.max(b));
        RowStyle {
            font: Arc::clone(self.fonts.choose(rng)),
            size: rng.gen_range(lo.min(hi)..=lo.max(hi)),
            color: Color::rgb(
                channel(&mut *rng, self.font_color_range[0]),
                channel(&mut *rng, self.font_color_range[1]),
                channel(&mut *rng, self.font_color_range[2]),
            ),
            bold: self.bold_probability > 0.0 && rng.gen_bool(self.bold_probability),
        }
    }

    /// Render a fresh row: text from the text source, random style
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> GeneratorResult<RowCrop> {
        let text = self.text_source.generate(rng);
        let style = self.random_style(rng);
        self.render(&text, &style)
    }

    pub fn render(&self, text: &str, style: &RowStyle) -> GeneratorResult<RowCrop> {
        let scaled = ScaledFont::new(style.font.as_ref(), BASE_FONT_SIZE);
        let (advance, line_height) = scaled.measure(text);
        let canvas_w = ((advance * 1.5).ceil() as u32).max(1) + GLYPH_PAD;
        let canvas_h = ((line_height * 2.0).ceil() as u32).max(1);
        let baseline = scaled.ascent().round();

        let mut canvas = Pixmap::new(canvas_w, canvas_h).ok_or_else(|| {
            GeneratorError::InvalidGeometry(format!("row canvas {canvas_w}x{canvas_h}"))
        })?;
        let mut mask = LabelMask::new(canvas_w, canvas_h, self.classes());
        let mut paint = Paint::default();
        paint.set_color_rgba8(style.color.r, style.color.g, style.color.b, 255);
        paint.anti_alias = true;

        let mut ink: Option<Rect> = None;
        let mut step = 0.0f32;
        for ch in text.chars() {
            let pen = step.round();
            step += scaled.advance(ch);
            if ch == ' ' {
                continue;
            }
            let Some(path) = scaled.glyph_path(ch, 0.0, baseline) else {
                continue;
            };
            let Some(glyph_box) = glyph_ink_box(&path, canvas_h, style.bold) else {
                continue;
            };

            // Solo-render coordinates back to row coordinates
            let x0 = (pen as i64 + glyph_box.x as i64 - GLYPH_PAD as i64).max(0) as u32;
            let x1 = ((pen as i64 + glyph_box.right() as i64 - GLYPH_PAD as i64).max(0) as u32)
                .min(canvas_w);
            if x1 <= x0 {
                continue;
            }
            let stamped = Rect::new(x0, glyph_box.y, x1 - x0, glyph_box.height);

            if let Some(code) = self.class_code(ch) {
                mask.fill_rect(stamped, code);
            }
            ink = Some(ink.map_or(stamped, |r| r.union(&stamped)));

            let transform = Transform::from_translate(pen, 0.0);
            draw_glyph(&mut canvas, &path, &paint, transform, style.bold);
        }

        let ink = ink.ok_or_else(|| GeneratorError::EmptyRender(text.to_string()))?;
        let bottom = ((ink.bottom() as f32 * BOTTOM_MARGIN) as u32)
            .max(ink.bottom())
            .min(canvas_h);
        let crop = Rect::new(ink.x, ink.y, ink.width, bottom - ink.y);

        let image = crop_rgba(&pixmap_to_rgba(&canvas), crop);
        let mask = mask.crop(crop);

        let scale = style.size / BASE_FONT_SIZE;
        let new_h = ((crop.height as f32 * scale).round() as u32).max(1);
        let new_w = ((new_h as f32 * crop.width as f32 / crop.height as f32).round() as u32).max(1);

        Ok(RowCrop {
            image: resize_rgba(&image, new_w, new_h),
            mask: mask.resize_nearest(new_w, new_h),
            text: text.to_string(),
        })
    }
}

fn draw_glyph(canvas: &mut Pixmap, path: &SkPath, paint: &Paint, transform: Transform, bold: bool) {
    canvas.fill_path(path, paint, FillRule::Winding, transform, None);
    if bold {
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        canvas.stroke_path(path, paint, &stroke, transform, None);
    }
}

/// Ink box of a glyph rendered alone, x offset by `GLYPH_PAD`
fn glyph_ink_box(path: &SkPath, height: u32, bold: bool) -> Option<Rect> {
    let width = (path.bounds().right().max(0.0).ceil() as u32) + 2 * GLYPH_PAD;
    let mut solo = Pixmap::new(width, height)?;
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = true;
    draw_glyph(
        &mut solo,
        path,
        &paint,
        Transform::from_translate(GLYPH_PAD as f32, 0.0),
        bold,
    );
    ink_bounds(&solo)
}
