//! TableRenderer – lays out a grid of text cells with separator lines
//!
//! Column widths and row heights come from measuring the cell texts; each
//! cell is then rendered by `RowRenderer`, pasted at its aligned offset, and
//! its mask merged into the table mask at the same offset.

use image::RgbaImage;
use rand::Rng;

use crate::config::TableConfig;
use crate::error::GeneratorResult;
use crate::font_utils::ScaledFont;
use crate::image_utils::{composite, fill_rect_rgba};
use crate::mask::LabelMask;
use crate::row_renderer::{RowRenderer, RowStyle};
use crate::types::{Alignment, Color, Rect};

#[derive(Debug, Clone)]
pub struct TableCrop {
    pub image: RgbaImage,
    pub mask: LabelMask,
    pub cells: Vec<Vec<String>>,
}

pub struct TableRenderer {
    max_cells: [usize; 2],
    line_width: [u32; 2],
    cell_padding: [u32; 2],
    margin: u32,
    line_color: Color,
}

impl TableRenderer {
    pub fn new(config: &TableConfig) -> Self {
        Self {
            max_cells: config.cells,
            line_width: config.line_width,
            cell_padding: config.cell_padding,
            margin: config.margin,
            line_color: Color::black(),
        }
    }

    /// Random grid filled from the row renderer's text source
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rows: &RowRenderer,
        rng: &mut R,
    ) -> GeneratorResult<TableCrop> {
        let n_cols = rng.gen_range(1..=self.max_cells[0].max(1));
        let n_rows = rng.gen_range(1..=self.max_cells[1].max(1));
        let cells: Vec<Vec<String>> = (0..n_rows)
            .map(|_| (0..n_cols).map(|_| rows.text_source().generate(rng)).collect())
            .collect();

        let align = Alignment::ALL[rng.gen_range(0..Alignment::ALL.len())];
        let [lo, hi] = self.line_width;
        let line_width = rng.gen_range(lo.min(hi)..=lo.max(hi));
        let style = rows.random_style(rng);
        self.compose(rows, cells, &vec![align; n_cols], line_width, &style)
    }

    pub fn compose(
        &self,
        rows: &RowRenderer,
        cells: Vec<Vec<String>>,
        align: &[Alignment],
        line_width: u32,
        style: &RowStyle,
    ) -> GeneratorResult<TableCrop> {
        let n_cols = cells.iter().map(Vec::len).max().unwrap_or(0);
        let scaled = ScaledFont::new(style.font.as_ref(), style.size);

        let mut col_w = vec![0u32; n_cols];
        let mut row_h = vec![0u32; cells.len()];
        for (i, row) in cells.iter().enumerate() {
            for (j, text) in row.iter().enumerate() {
                let (w, h) = scaled.measure(text);
                col_w[j] = col_w[j].max(w.ceil() as u32);
                row_h[i] = row_h[i].max(h.ceil() as u32);
            }
        }

        let [pad_x, pad_y] = self.cell_padding;
        let tab_w: u32 = col_w.iter().sum::<u32>() + n_cols as u32 * 2 * pad_x;
        let tab_h: u32 = row_h.iter().sum::<u32>() + cells.len() as u32 * 2 * pad_y;
        let origin = self.margin + line_width / 2;
        let width = tab_w + 2 * self.margin + line_width;
        let height = tab_h + 2 * self.margin + line_width;

        let mut image = RgbaImage::new(width, height);
        let mut mask = LabelMask::new(width, height, rows.classes());

        // Separator lines, centred on the cell boundaries
        let mut top = origin;
        for h in row_h.iter().chain(std::iter::once(&0)) {
            let line = Rect::new(origin - line_width / 2, top - line_width / 2, tab_w + line_width, line_width);
            fill_rect_rgba(&mut image, line, self.line_color);
            top += h + 2 * pad_y;
        }
        let mut left = origin;
        for w in col_w.iter().chain(std::iter::once(&0)) {
            let line = Rect::new(left - line_width / 2, origin - line_width / 2, line_width, tab_h + line_width);
            fill_rect_rgba(&mut image, line, self.line_color);
            left += w + 2 * pad_x;
        }

        let mut top = origin + pad_y;
        for (i, row) in cells.iter().enumerate() {
            let mut left = origin + pad_x;
            for (j, text) in row.iter().enumerate() {
                match rows.render(text, style) {
                    Ok(crop) => {
                        let alignment = align.get(j).copied().unwrap_or(Alignment::Left);
                        let x = left + alignment.offset(col_w[j], crop.image.width());
                        composite(&mut image, &crop.image, x, top);
                        mask.merge(&crop.mask, Some(&crop.image), x, top);
                    }
                    Err(e) if e.is_recoverable() => {
                        log::debug!("table cell ({i}, {j}) skipped: {e}");
                    }
                    Err(e) => return Err(e),
                }
                left += col_w[j] + 2 * pad_x;
            }
            top += row_h[i] + 2 * pad_y;
        }

        Ok(TableCrop { image, mask, cells })
    }
}
