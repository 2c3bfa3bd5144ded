//! One-hot class rasters
//!
//! A `LabelMask` stores one class label per pixel instead of one plane per
//! class. Every pixel therefore belongs to exactly one channel at all times;
//! the `(classes, H, W)` one-hot view is produced only when the mask is saved.

use image::RgbaImage;

use crate::types::Rect;

/// Label 0: "no character" in class masks, "background" in field masks
pub const BACKGROUND: u16 = 0;

/// Alpha at or above which a source pixel counts as ink when merging
pub const INK_ALPHA: u8 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMask {
    width: u32,
    height: u32,
    classes: u16,
    data: Vec<u16>,
}

impl LabelMask {
    /// All-background mask with `classes` channels (channel 0 included)
    pub fn new(width: u32, height: u32, classes: u16) -> Self {
        Self {
            width,
            height,
            classes: classes.max(1),
            data: vec![BACKGROUND; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of one-hot channels, background included
    pub fn classes(&self) -> u16 {
        self.classes
    }

    pub fn labels(&self) -> &[u16] {
        &self.data
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, label: u16) {
        debug_assert!(label < self.classes);
        let i = self.index(x, y);
        self.data[i] = label;
    }

    /// Fill `rect` (clipped to the mask) with `label`
    pub fn fill_rect(&mut self, rect: Rect, label: u16) {
        debug_assert!(label < self.classes);
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        for y in rect.y.min(y_end)..y_end {
            let row = self.index(0, y);
            for x in rect.x.min(x_end)..x_end {
                self.data[row + x as usize] = label;
            }
        }
    }

    /// Count of pixels carrying `label`
    pub fn count(&self, label: u16) -> usize {
        self.data.iter().filter(|&&l| l == label).count()
    }

    /// Count of pixels with any non-background label inside `rect`
    pub fn count_labelled_in(&self, rect: Rect) -> usize {
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        let mut n = 0;
        for y in rect.y.min(y_end)..y_end {
            for x in rect.x.min(x_end)..x_end {
                if self.get(x, y) != BACKGROUND {
                    n += 1;
                }
            }
        }
        n
    }

    /// Bounding box of every non-background pixel
    pub fn labelled_bounds(&self) -> Option<Rect> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) == BACKGROUND {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds.map(|(x0, y0, x1, y1)| Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }

    /// Copy of the region `rect`; parts outside the mask read as background
    pub fn crop(&self, rect: Rect) -> LabelMask {
        let mut out = LabelMask::new(rect.width, rect.height, self.classes);
        for y in 0..rect.height {
            let sy = rect.y + y;
            if sy >= self.height {
                break;
            }
            for x in 0..rect.width {
                let sx = rect.x + x;
                if sx >= self.width {
                    break;
                }
                out.set(x, y, self.get(sx, sy));
            }
        }
        out
    }

    /// Nearest-neighbour resize; labels are never blended
    pub fn resize_nearest(&self, width: u32, height: u32) -> LabelMask {
        let mut out = LabelMask::new(width, height, self.classes);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        let sx_scale = self.width as f64 / width.max(1) as f64;
        let sy_scale = self.height as f64 / height.max(1) as f64;
        for y in 0..height {
            let sy = (((y as f64 + 0.5) * sy_scale) as u32).min(self.height - 1);
            for x in 0..width {
                let sx = (((x as f64 + 0.5) * sx_scale) as u32).min(self.width - 1);
                out.set(x, y, self.get(sx, sy));
            }
        }
        out
    }

    /// Merge `src` with its top-left corner at `(x, y)`.
    ///
    /// Inside the footprint a pixel takes the source label when that label is
    /// non-background, or background when `alpha` marks it as unlabelled ink.
    /// Every other destination pixel keeps its label.
    pub fn merge(&mut self, src: &LabelMask, alpha: Option<&RgbaImage>, x: u32, y: u32) {
        debug_assert!(src.classes <= self.classes);
        for sy in 0..src.height {
            let dy = y + sy;
            if dy >= self.height {
                break;
            }
            for sx in 0..src.width {
                let dx = x + sx;
                if dx >= self.width {
                    break;
                }
                let label = src.get(sx, sy);
                if label != BACKGROUND {
                    self.set(dx, dy, label);
                    continue;
                }
                let is_ink = alpha
                    .filter(|a| sx < a.width() && sy < a.height())
                    .map(|a| a.get_pixel(sx, sy)[3] >= INK_ALPHA)
                    .unwrap_or(false);
                if is_ink {
                    self.set(dx, dy, BACKGROUND);
                }
            }
        }
    }

    /// Per-pixel one-hot value of `channel`
    pub fn channel_values(&self, channel: u16) -> impl Iterator<Item = f32> + '_ {
        self.data
            .iter()
            .map(move |&l| if l == channel { 1.0 } else { 0.0 })
    }
}
