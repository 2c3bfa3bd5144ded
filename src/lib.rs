//! Synthetic document page generator
//!
//! Composes a background, a table and randomly placed text rows into page
//! images, and derives alongside them a per-character class mask, a field
//! (table vs. background) mask and the geometry of every placed block.

mod background;
pub mod config;
mod error;
mod font_utils;
pub mod generator;
mod image_utils;
mod mask;
pub mod npy;
pub mod output;
mod paver;
mod row_renderer;
mod table_renderer;
mod text_source;
mod types;

pub use background::BackgroundSource;
pub use config::GeneratorConfig;
pub use error::{GeneratorError, GeneratorResult};
pub use font_utils::{FontPool, GlyphFont, ScaledFont, TtfFont};
pub use generator::{BatchReport, Generator, Page};
pub use image_utils::RotationPlan;
pub use mask::LabelMask;
pub use output::OutputDir;
pub use paver::Paver;
pub use row_renderer::{RowCrop, RowRenderer, RowStyle};
pub use table_renderer::{TableCrop, TableRenderer};
pub use text_source::TextSource;
pub use types::{Alignment, Color, PageMeta, Rect, RowRecord, TableRecord};
