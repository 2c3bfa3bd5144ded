//! Generator configuration
//!
//! Loaded from a TOML file with one table per collaborator:
//!
//! ```toml
//! [generator]
//! num_pages = 100
//! output_dir = "gen_data"
//! alphabet = "abcdefghijklmnopqrstuvwxyz0123456789"
//! row_angle = [-3.0, 3.0]
//! rows_per_page = [10, 40]
//!
//! [background]
//! size = [1240, 1754]
//!
//! [row]
//! fonts_path = "fonts/"
//! font_size = [18.0, 42.0]
//!
//! [table]
//! cells = [4, 8]
//!
//! [text]
//! kind = "random"
//! words_in_row = [1, 5]
//! max_word_len = 10
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GeneratorError, GeneratorResult};
use crate::types::Color;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub generator: GeneratorSection,
    #[serde(default)]
    pub background: BackgroundConfig,
    pub row: RowConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub text: TextConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSection {
    #[serde(default = "default_num_pages")]
    pub num_pages: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Symbol order defines class channels 1..=len
    pub alphabet: String,
    /// Row rotation range in degrees
    #[serde(default = "default_row_angle")]
    pub row_angle: [f32; 2],
    /// Range the per-page row budget is drawn from
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: [usize; 2],
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// `[width, height]` in pixels
    #[serde(default = "default_page_size")]
    pub size: [u32; 2],
    /// Image file or directory of images; solid `color` when absent
    #[serde(default)]
    pub images_path: Option<PathBuf>,
    #[serde(default = "Color::white")]
    pub color: Color,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            size: default_page_size(),
            images_path: None,
            color: Color::white(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowConfig {
    /// `.ttf` file or directory of fonts
    pub fonts_path: PathBuf,
    /// Rendered text height range in pixels
    #[serde(default = "default_font_size")]
    pub font_size: [f32; 2],
    /// Inclusive `[min, max]` per RGB channel
    #[serde(default = "default_color_range")]
    pub font_color_range: [[u8; 2]; 3],
    #[serde(default)]
    pub bold_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `[max_columns, max_rows]`
    #[serde(default = "default_cells")]
    pub cells: [usize; 2],
    #[serde(default = "default_line_width")]
    pub line_width: [u32; 2],
    /// `[horizontal, vertical]` padding inside each cell
    #[serde(default = "default_cell_padding")]
    pub cell_padding: [u32; 2],
    #[serde(default = "default_margin")]
    pub margin: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cells: default_cells(),
            line_width: default_line_width(),
            cell_padding: default_cell_padding(),
            margin: default_margin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TextConfig {
    Random {
        #[serde(default = "default_words_in_row")]
        words_in_row: [usize; 2],
        #[serde(default = "default_max_word_len")]
        max_word_len: usize,
    },
    Corpus {
        path: PathBuf,
    },
}

impl Default for TextConfig {
    fn default() -> Self {
        TextConfig::Random {
            words_in_row: default_words_in_row(),
            max_word_len: default_max_word_len(),
        }
    }
}

fn default_num_pages() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("gen_data")
}

fn default_row_angle() -> [f32; 2] {
    [-3.0, 3.0]
}

fn default_rows_per_page() -> [usize; 2] {
    [10, 40]
}

fn default_page_size() -> [u32; 2] {
    [1024, 1024]
}

fn default_font_size() -> [f32; 2] {
    [20.0, 40.0]
}

fn default_color_range() -> [[u8; 2]; 3] {
    [[0, 255], [0, 255], [0, 255]]
}

fn default_true() -> bool {
    true
}

fn default_cells() -> [usize; 2] {
    [4, 6]
}

fn default_line_width() -> [u32; 2] {
    [2, 5]
}

fn default_cell_padding() -> [u32; 2] {
    [30, 5]
}

fn default_margin() -> u32 {
    1
}

fn default_words_in_row() -> [usize; 2] {
    [1, 4]
}

fn default_max_word_len() -> usize {
    8
}

impl GeneratorConfig {
    /// Read and validate a TOML configuration file
    pub fn load(path: &Path) -> GeneratorResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            GeneratorError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> GeneratorResult<Self> {
        let config: GeneratorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of class-mask channels: one per alphabet symbol plus "no character"
    pub fn class_count(&self) -> usize {
        self.generator.alphabet.chars().count() + 1
    }

    pub fn validate(&self) -> GeneratorResult<()> {
        let g = &self.generator;
        if g.alphabet.is_empty() {
            return Err(invalid("generator.alphabet must not be empty"));
        }
        if self.class_count() > u16::MAX as usize {
            return Err(invalid("generator.alphabet is too long"));
        }
        check_range("generator.row_angle", g.row_angle[0], g.row_angle[1])?;
        check_range("generator.rows_per_page", g.rows_per_page[0], g.rows_per_page[1])?;
        if g.threads == Some(0) {
            return Err(invalid("generator.threads must be at least 1"));
        }

        let [w, h] = self.background.size;
        if w == 0 || h == 0 {
            return Err(invalid("background.size must be non-zero"));
        }

        let r = &self.row;
        if r.font_size[0] <= 0.0 {
            return Err(invalid("row.font_size must be positive"));
        }
        check_range("row.font_size", r.font_size[0], r.font_size[1])?;
        for (channel, range) in ["r", "g", "b"].iter().zip(r.font_color_range.iter()) {
            check_range(&format!("row.font_color_range.{channel}"), range[0], range[1])?;
        }
        if !(0.0..=1.0).contains(&r.bold_probability) {
            return Err(invalid("row.bold_probability must be within [0, 1]"));
        }

        let t = &self.table;
        if t.enabled && (t.cells[0] == 0 || t.cells[1] == 0) {
            return Err(invalid("table.cells must be at least 1 x 1"));
        }
        check_range("table.line_width", t.line_width[0], t.line_width[1])?;

        if let TextConfig::Random {
            words_in_row,
            max_word_len,
        } = &self.text
        {
            if words_in_row[0] == 0 || *max_word_len == 0 {
                return Err(invalid("text.words_in_row and text.max_word_len must be at least 1"));
            }
            check_range("text.words_in_row", words_in_row[0], words_in_row[1])?;
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> GeneratorError {
    GeneratorError::Config(msg.to_string())
}

fn check_range<T: PartialOrd + std::fmt::Debug>(name: &str, lo: T, hi: T) -> GeneratorResult<()> {
    if lo > hi {
        return Err(GeneratorError::Config(format!(
            "{name}: min {lo:?} is greater than max {hi:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [generator]
        alphabet = "ab"

        [row]
        fonts_path = "fonts"
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = GeneratorConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.generator.num_pages, 1);
        assert_eq!(config.class_count(), 3);
        assert_eq!(config.background.size, [1024, 1024]);
        assert_eq!(config.background.color, Color::white());
        assert!(config.table.enabled);
        assert_eq!(config.table.cell_padding, [30, 5]);
        assert!(matches!(config.text, TextConfig::Random { max_word_len: 8, .. }));
    }

    #[test]
    fn test_corpus_text_section() {
        let text = format!("{MINIMAL}\n[text]\nkind = \"corpus\"\npath = \"words.txt\"\n");
        let config = GeneratorConfig::from_toml(&text).unwrap();
        match config.text {
            TextConfig::Corpus { path } => assert_eq!(path, PathBuf::from("words.txt")),
            other => panic!("unexpected text config {other:?}"),
        }
    }

    #[test]
    fn test_inverted_range_rejected() {
        let text = MINIMAL.replace("alphabet = \"ab\"", "alphabet = \"ab\"\nrow_angle = [5.0, -5.0]");
        let err = GeneratorConfig::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("row_angle"), "{err}");
    }

    #[test]
    fn test_empty_alphabet_and_missing_fonts_rejected() {
        let err = GeneratorConfig::from_toml(&MINIMAL.replace("\"ab\"", "\"\"")).unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));

        let err = GeneratorConfig::from_toml("[generator]\nalphabet = \"a\"\n").unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));
    }
}
