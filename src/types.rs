//! Type definitions shared by the renderers and the page composer

use serde::{Deserialize, Serialize};

/// Integer pixel rectangle (top-left origin, y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> u32 {
        self.x
    }

    pub fn top(&self) -> u32 {
        self.y
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }
}

/// 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn black() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }

    pub fn white() -> Self {
        Self { r: 255, g: 255, b: 255 }
    }

    pub fn to_rgba(self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, alpha])
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// Horizontal alignment of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub const ALL: [Alignment; 3] = [Alignment::Left, Alignment::Right, Alignment::Center];

    /// Offset of content `content_width` wide inside a slot `slot_width` wide
    pub fn offset(self, slot_width: u32, content_width: u32) -> u32 {
        let free = slot_width.saturating_sub(content_width);
        match self {
            Alignment::Left => 0,
            Alignment::Center => free / 2,
            Alignment::Right => free,
        }
    }
}

/// One placed text row. `size` is `[height, width]` of the rotated crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub left_top: [u32; 2],
    pub size: [u32; 2],
    pub text: String,
    pub angle: f32,
}

impl RowRecord {
    /// Page-space footprint of the row
    pub fn rect(&self) -> Rect {
        Rect::new(self.left_top[0], self.left_top[1], self.size[1], self.size[0])
    }
}

/// The placed table. `size` is `[height, width]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub left_top: [u32; 2],
    pub size: [u32; 2],
    pub text: Vec<Vec<String>>,
}

impl TableRecord {
    pub fn rect(&self) -> Rect {
        Rect::new(self.left_top[0], self.left_top[1], self.size[1], self.size[0])
    }
}

/// Contents of `row_coords/{id}.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub rows: Vec<RowRecord>,
    pub table: Option<TableRecord>,
}
