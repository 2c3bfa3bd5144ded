//! Font utilities for glyph rasterization
//!
//! Fonts are reached through the `GlyphFont` seam: metrics in font units plus
//! an outline callback. `TtfFont` backs it with ttf-parser; the outline is
//! turned into a tiny-skia path by `GlyphPathBuilder`.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{Path as SkPath, PathBuilder};
use ttf_parser::{Face, OutlineBuilder};

use crate::error::{GeneratorError, GeneratorResult};

const FONT_EXTENSIONS: [&str; 4] = ["ttf", "TTF", "otf", "OTF"];

/// Metrics and outlines of one font face, in font units (y up)
pub trait GlyphFont: Send + Sync {
    fn name(&self) -> &str;

    fn units_per_em(&self) -> f32;

    fn ascender(&self) -> f32;

    /// Usually negative
    fn descender(&self) -> f32;

    /// Horizontal advance of `ch`
    fn advance(&self, ch: char) -> f32;

    /// Feed the outline of `ch` into `builder`; false when the glyph has no outline
    fn outline(&self, ch: char, builder: &mut dyn OutlineBuilder) -> bool;
}

impl fmt::Debug for dyn GlyphFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphFont").field("name", &self.name()).finish()
    }
}

/// Load TTF/OTF font from file path
pub fn load_font_file(path: &Path) -> GeneratorResult<Vec<u8>> {
    if !path.exists() {
        return Err(GeneratorError::FontError(format!(
            "Font file not found: {}",
            path.display()
        )));
    }

    let mut file = File::open(path).map_err(|e| {
        GeneratorError::FontError(format!("Failed to open font file {}: {}", path.display(), e))
    })?;

    let mut font_data = Vec::new();
    file.read_to_end(&mut font_data).map_err(|e| {
        GeneratorError::FontError(format!("Failed to read font file {}: {}", path.display(), e))
    })?;

    // Validate font using ttf-parser
    Face::parse(&font_data, 0).map_err(|e| {
        GeneratorError::FontError(format!("Invalid font file {}: {}", path.display(), e))
    })?;

    Ok(font_data)
}

/// TrueType/OpenType face parsed once and kept for the process lifetime
#[derive(Debug)]
pub struct TtfFont {
    name: String,
    face: Face<'static>,
}

impl TtfFont {
    pub fn open(path: &Path) -> GeneratorResult<Self> {
        let data = load_font_file(path)?;
        // Font assets are loaded once at setup and shared by every worker until exit
        let data: &'static [u8] = Box::leak(data.into_boxed_slice());
        let face = Face::parse(data, 0).map_err(|e| {
            GeneratorError::FontError(format!("Invalid font file {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("font")
            .to_string();
        Ok(Self { name, face })
    }
}

impl GlyphFont for TtfFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn units_per_em(&self) -> f32 {
        self.face.units_per_em() as f32
    }

    fn ascender(&self) -> f32 {
        self.face.ascender() as f32
    }

    fn descender(&self) -> f32 {
        self.face.descender() as f32
    }

    fn advance(&self, ch: char) -> f32 {
        let gid = self.face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
        self.face
            .glyph_hor_advance(gid)
            .unwrap_or(self.face.units_per_em() / 2) as f32
    }

    fn outline(&self, ch: char, builder: &mut dyn OutlineBuilder) -> bool {
        let gid = self.face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
        self.face.outline_glyph(gid, builder).is_some()
    }
}

/// Pixel-size view of a font
#[derive(Clone, Copy)]
pub struct ScaledFont<'a> {
    pub font: &'a dyn GlyphFont,
    pub size: f32,
}

impl<'a> ScaledFont<'a> {
    pub fn new(font: &'a dyn GlyphFont, size: f32) -> Self {
        Self { font, size }
    }

    pub fn scale(&self) -> f32 {
        self.size / self.font.units_per_em()
    }

    pub fn ascent(&self) -> f32 {
        self.font.ascender() * self.scale()
    }

    pub fn line_height(&self) -> f32 {
        (self.font.ascender() - self.font.descender()) * self.scale()
    }

    pub fn advance(&self, ch: char) -> f32 {
        self.font.advance(ch) * self.scale()
    }

    /// Width and height of `text` without rendering it
    pub fn measure(&self, text: &str) -> (f32, f32) {
        let width = text.chars().map(|ch| self.advance(ch)).sum();
        (width, self.line_height())
    }

    /// Glyph outline as a pixel-space path, baseline at `baseline_y`, pen at `origin_x`
    pub fn glyph_path(&self, ch: char, origin_x: f32, baseline_y: f32) -> Option<SkPath> {
        let mut builder = GlyphPathBuilder::new(origin_x, baseline_y, self.scale());
        if !self.font.outline(ch, &mut builder) {
            return None;
        }
        builder.finish()
    }
}

/// Maps font-unit outline commands (y up) to pixel space (y down)
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    baseline_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, baseline_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            baseline_y,
            scale,
        }
    }

    fn finish(self) -> Option<SkPath> {
        self.builder.finish()
    }

    fn px(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.px(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.px(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.px(x1, y1);
        let (x, y) = self.px(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.px(x1, y1);
        let (x2, y2) = self.px(x2, y2);
        let (x, y) = self.px(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Read-only pool of fonts shared by all page workers
#[derive(Clone, Debug)]
pub struct FontPool {
    fonts: Vec<Arc<dyn GlyphFont>>,
}

impl FontPool {
    /// Load every font from a directory, or a single font file
    pub fn from_path(path: &Path) -> GeneratorResult<Self> {
        let paths: Vec<PathBuf> = if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_font_extension(p))
                .collect();
            found.sort();
            found
        } else if has_font_extension(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };

        if paths.is_empty() {
            return Err(GeneratorError::Config(format!(
                "fonts_path must be either a directory containing .ttf fonts or a path to a .ttf font: {}",
                path.display()
            )));
        }

        let fonts = paths
            .iter()
            .map(|p| TtfFont::open(p).map(|f| Arc::new(f) as Arc<dyn GlyphFont>))
            .collect::<GeneratorResult<Vec<_>>>()?;
        log::info!("Loaded {} font(s) from {}", fonts.len(), path.display());
        Ok(Self { fonts })
    }

    pub fn from_fonts(fonts: Vec<Arc<dyn GlyphFont>>) -> GeneratorResult<Self> {
        if fonts.is_empty() {
            return Err(GeneratorError::Config("font pool is empty".to_string()));
        }
        Ok(Self { fonts })
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn GlyphFont>> {
        self.fonts.iter().find(|f| f.name() == name)
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &Arc<dyn GlyphFont> {
        // Non-empty by construction
        self.fonts.choose(rng).unwrap_or(&self.fonts[0])
    }
}

fn has_font_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FONT_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod test_fonts {
    //! Box-glyph font for tests that must run without font files.

    use super::*;

    /// Every glyph is one or two solid boxes: `i` and `j` carry a separate dot,
    /// `g`, `j`, `p`, `q` and `y` reach below the baseline.
    pub struct BlockFont;

    impl BlockFont {
        pub fn pool() -> FontPool {
            FontPool::from_fonts(vec![Arc::new(BlockFont) as Arc<dyn GlyphFont>])
                .expect("non-empty pool")
        }
    }

    fn block(builder: &mut dyn OutlineBuilder, x0: f32, y0: f32, x1: f32, y1: f32) {
        builder.move_to(x0, y0);
        builder.line_to(x1, y0);
        builder.line_to(x1, y1);
        builder.line_to(x0, y1);
        builder.close();
    }

    impl GlyphFont for BlockFont {
        fn name(&self) -> &str {
            "block"
        }

        fn units_per_em(&self) -> f32 {
            1000.0
        }

        fn ascender(&self) -> f32 {
            800.0
        }

        fn descender(&self) -> f32 {
            -200.0
        }

        fn advance(&self, ch: char) -> f32 {
            if ch == ' ' {
                300.0
            } else {
                600.0
            }
        }

        fn outline(&self, ch: char, builder: &mut dyn OutlineBuilder) -> bool {
            match ch {
                ' ' => false,
                'i' | 'j' => {
                    let bottom = if ch == 'j' { -200.0 } else { 0.0 };
                    block(builder, 200.0, bottom, 400.0, 500.0);
                    block(builder, 200.0, 600.0, 400.0, 700.0);
                    true
                }
                'g' | 'p' | 'q' | 'y' => {
                    block(builder, 100.0, -200.0, 500.0, 500.0);
                    true
                }
                _ => {
                    block(builder, 100.0, 0.0, 500.0, 700.0);
                    true
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_fonts::BlockFont;
    use super::*;

    #[test]
    fn test_scaled_metrics() {
        let font = BlockFont;
        let scaled = ScaledFont::new(&font, 50.0);
        assert_eq!(scaled.scale(), 0.05);
        assert_eq!(scaled.ascent(), 40.0);
        assert_eq!(scaled.line_height(), 50.0);
        assert_eq!(scaled.measure("a b"), (75.0, 50.0));
    }

    #[test]
    fn test_glyph_path_is_flipped_to_pixel_space() {
        let font = BlockFont;
        let scaled = ScaledFont::new(&font, 50.0);
        let path = scaled.glyph_path('a', 10.0, 40.0).unwrap();
        let bounds = path.bounds();
        assert_eq!(bounds.left(), 15.0);
        assert_eq!(bounds.right(), 35.0);
        assert_eq!(bounds.top(), 5.0);
        assert_eq!(bounds.bottom(), 40.0);
        assert!(scaled.glyph_path(' ', 0.0, 40.0).is_none());
    }

    #[test]
    fn test_missing_font_path_is_fatal() {
        let err = FontPool::from_path(Path::new("/nonexistent/fonts")).unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));
        let err = TtfFont::open(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, GeneratorError::FontError(_)));
    }

    #[test]
    fn test_empty_font_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a font").unwrap();
        let err = FontPool::from_path(dir.path()).unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));
    }

    #[test]
    fn test_invalid_font_file_is_font_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        fs::write(&path, b"definitely not a font").unwrap();
        let err = FontPool::from_path(dir.path()).unwrap_err();
        assert!(matches!(err, GeneratorError::FontError(_)));
    }
}
