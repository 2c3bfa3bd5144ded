//! Page composition and batch generation
//!
//! A page is built in one sequential pass: background, then the table, then
//! rows until the row budget is spent or the paver reports no space. Every
//! paste goes to the image and the masks at the same origin with the same
//! crop, so the three rasters stay pixel-aligned.
//!
//! Pages are independent of each other and are generated in parallel; each
//! one draws from its own generator seeded from the batch seed and its
//! index, so a batch is reproducible regardless of thread count.

use image::{DynamicImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::background::BackgroundSource;
use crate::config::GeneratorConfig;
use crate::error::{GeneratorError, GeneratorResult};
use crate::font_utils::FontPool;
use crate::image_utils::{composite, RotationPlan};
use crate::mask::LabelMask;
use crate::output::OutputDir;
use crate::paver::Paver;
use crate::row_renderer::RowRenderer;
use crate::table_renderer::TableRenderer;
use crate::text_source::TextSource;
use crate::types::{PageMeta, Rect, RowRecord, TableRecord};

/// Field mask labels
pub const FIELD_BACKGROUND: u16 = 0;
pub const FIELD_TABLE: u16 = 1;
const FIELD_CLASSES: u16 = 2;

/// Consecutive blank renders tolerated before the row loop gives up
const MAX_EMPTY_ROWS: usize = 16;

/// One finished page: RGB pixels, class labels, field labels and geometry
#[derive(Debug, Clone)]
pub struct Page {
    pub image: RgbImage,
    pub char_mask: LabelMask,
    pub field_mask: LabelMask,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub produced: usize,
    pub failed: usize,
    pub first_id: u64,
}

pub struct Generator {
    config: GeneratorConfig,
    rows: RowRenderer,
    table: Option<TableRenderer>,
    background: BackgroundSource,
}

impl Generator {
    /// Load fonts, text source and backgrounds named by `config`
    pub fn new(config: GeneratorConfig) -> GeneratorResult<Self> {
        config.validate()?;
        let alphabet = config.generator.alphabet.clone();
        let fonts = FontPool::from_path(&config.row.fonts_path)?;
        let text = TextSource::from_config(&config.text, &alphabet)?;
        let rows = RowRenderer::new(&alphabet, fonts, text, &config.row)?;
        let background = BackgroundSource::from_config(&config.background)?;
        Ok(Self::with_parts(config, rows, background))
    }

    /// Assemble from already-built collaborators
    pub fn with_parts(
        config: GeneratorConfig,
        rows: RowRenderer,
        background: BackgroundSource,
    ) -> Self {
        let table = config
            .table
            .enabled
            .then(|| TableRenderer::new(&config.table));
        Self {
            config,
            rows,
            table,
            background,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// `(width, height)` of every page
    pub fn page_size(&self) -> (u32, u32) {
        let [w, h] = self.config.background.size;
        (w, h)
    }

    pub fn compose_page<R: Rng + ?Sized>(&self, rng: &mut R) -> GeneratorResult<Page> {
        let (width, height) = self.page_size();
        let background = self.background.next_background(width, height, rng)?;
        let mut canvas = DynamicImage::ImageRgb8(background).to_rgba8();
        let mut char_mask = LabelMask::new(width, height, self.rows.classes());
        let mut field_mask = LabelMask::new(width, height, FIELD_CLASSES);
        let mut paver = Paver::new(height, width);
        let mut meta = PageMeta::default();

        if let Some(table) = &self.table {
            match table.generate(&self.rows, rng) {
                Ok(crop) => {
                    let (w, h) = crop.image.dimensions();
                    match paver.place(w, h, rng) {
                        Some((x, y)) => {
                            composite(&mut canvas, &crop.image, x, y);
                            char_mask.merge(&crop.mask, Some(&crop.image), x, y);
                            field_mask.fill_rect(Rect::new(x, y, w, h), FIELD_TABLE);
                            meta.table = Some(TableRecord {
                                left_top: [x, y],
                                size: [h, w],
                                text: crop.cells,
                            });
                        }
                        None => log::debug!("no space for a {w}x{h} table"),
                    }
                }
                Err(e) if e.is_recoverable() => log::debug!("table skipped: {e}"),
                Err(e) => return Err(e),
            }
        }

        let [lo, hi] = self.config.generator.rows_per_page;
        let max_rows = rng.gen_range(lo.min(hi)..=lo.max(hi));
        let [a0, a1] = self.config.generator.row_angle;
        let mut empty = 0;
        while meta.rows.len() < max_rows {
            let crop = match self.rows.generate(rng) {
                Ok(crop) => crop,
                Err(e) if e.is_recoverable() => {
                    empty += 1;
                    if empty >= MAX_EMPTY_ROWS {
                        log::warn!("giving up on rows after {empty} blank renders");
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let angle = rng.gen_range(a0.min(a1)..=a0.max(a1));
            let plan = RotationPlan::new(angle, crop.image.width(), crop.image.height());
            let image = plan.rotate_rgba(&crop.image);
            let mask = plan.rotate_labels(&crop.mask);

            let (w, h) = image.dimensions();
            let Some((x, y)) = paver.place(w, h, rng) else {
                log::debug!("page full after {} rows", meta.rows.len());
                break;
            };
            composite(&mut canvas, &image, x, y);
            char_mask.merge(&mask, Some(&image), x, y);
            meta.rows.push(RowRecord {
                left_top: [x, y],
                size: [h, w],
                text: crop.text,
                angle,
            });
        }

        Ok(Page {
            image: DynamicImage::ImageRgba8(canvas).to_rgb8(),
            char_mask,
            field_mask,
            meta,
        })
    }

    /// Generate `generator.num_pages` pages into `generator.output_dir`
    pub fn run(&self) -> GeneratorResult<BatchReport> {
        let out = OutputDir::create(&self.config.generator.output_dir)?;
        self.run_into(&out, self.config.generator.num_pages)
    }

    pub fn run_into(&self, out: &OutputDir, num_pages: usize) -> GeneratorResult<BatchReport> {
        let first_id = out.next_id()?;
        let seed = self.config.generator.seed.unwrap_or_else(rand::random);
        log::info!(
            "Generating {} pages into {} (first id {}, seed {})",
            num_pages,
            out.root().display(),
            first_id,
            seed
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.generator.threads.unwrap_or(0))
            .build()
            .map_err(|e| GeneratorError::Config(format!("thread pool: {e}")))?;

        let done = AtomicUsize::new(0);
        let step = (num_pages / 10).max(1);
        let produced = pool.install(|| {
            (0..num_pages)
                .into_par_iter()
                .filter(|&i| {
                    let id = first_id + i as u64;
                    let mut rng = StdRng::seed_from_u64(page_seed(seed, i as u64));
                    let outcome = self
                        .compose_page(&mut rng)
                        .and_then(|page| out.write_page(id, &page));

                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % step == 0 || n == num_pages {
                        log::info!("{n}/{num_pages} pages done");
                    }
                    match outcome {
                        Ok(()) => true,
                        Err(e) => {
                            log::error!("page {id} failed: {e}");
                            false
                        }
                    }
                })
                .count()
        });

        Ok(BatchReport {
            produced,
            failed: num_pages - produced,
            first_id,
        })
    }
}

/// Independent per-page seed (splitmix64 finaliser over seed and index)
fn page_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_utils::test_fonts::BlockFont;
    use crate::mask::BACKGROUND;
    use crate::types::Color;

    const CONFIG: &str = r#"
        [generator]
        alphabet = "ab"
        rows_per_page = [5, 12]
        seed = 7

        [background]
        size = [300, 240]

        [row]
        fonts_path = "unused"
        font_size = [20.0, 30.0]

        [table]
        cells = [2, 3]
        cell_padding = [6, 3]

        [text]
        kind = "random"
        words_in_row = [1, 2]
        max_word_len = 3
    "#;

    fn generator_from(toml: &str) -> Generator {
        let config = GeneratorConfig::from_toml(toml).unwrap();
        let text = TextSource::from_config(&config.text, &config.generator.alphabet).unwrap();
        let rows =
            RowRenderer::new(&config.generator.alphabet, BlockFont::pool(), text, &config.row)
                .unwrap();
        Generator::with_parts(config, rows, BackgroundSource::Solid(Color::white()))
    }

    fn generator() -> Generator {
        generator_from(CONFIG)
    }

    #[test]
    fn test_page_rasters_share_one_grid() {
        let gen = generator();
        let page = gen.compose_page(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(page.image.dimensions(), (300, 240));
        assert_eq!((page.char_mask.width(), page.char_mask.height()), (300, 240));
        assert_eq!((page.field_mask.width(), page.field_mask.height()), (300, 240));
        assert_eq!(page.char_mask.classes(), 3);
        assert_eq!(page.field_mask.classes(), 2);
        assert!(page.char_mask.labels().iter().all(|&l| l < 3));
    }

    #[test]
    fn test_rows_and_table_never_overlap() {
        let gen = generator();
        for seed in 0..5 {
            let page = gen.compose_page(&mut StdRng::seed_from_u64(seed)).unwrap();
            let mut rects: Vec<Rect> = page.meta.rows.iter().map(RowRecord::rect).collect();
            rects.extend(page.meta.table.as_ref().map(TableRecord::rect));
            assert!(!page.meta.rows.is_empty());
            assert!(page.meta.rows.len() <= 12);
            for (i, a) in rects.iter().enumerate() {
                assert!(a.right() <= 300 && a.bottom() <= 240);
                for b in &rects[i + 1..] {
                    assert!(!a.intersects(b), "{a:?} vs {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_field_mask_covers_table_footprint() {
        let gen = generator();
        let page = gen.compose_page(&mut StdRng::seed_from_u64(3)).unwrap();
        let table = page.meta.table.as_ref().expect("table fits an empty page");
        let rect = table.rect();
        assert_eq!(
            page.field_mask.count(FIELD_TABLE),
            (rect.width * rect.height) as usize
        );
        assert_eq!(page.field_mask.count_labelled_in(rect), page.field_mask.count(FIELD_TABLE));
        assert!(!table.text.is_empty());
    }

    #[test]
    fn test_char_labels_only_inside_placed_blocks() {
        let gen = generator();
        let page = gen.compose_page(&mut StdRng::seed_from_u64(4)).unwrap();
        let mut inside = page
            .meta
            .rows
            .iter()
            .map(|r| page.char_mask.count_labelled_in(r.rect()))
            .sum::<usize>();
        inside += page
            .meta
            .table
            .as_ref()
            .map(|t| page.char_mask.count_labelled_in(t.rect()))
            .unwrap_or(0);
        let total = page.char_mask.labels().iter().filter(|&&l| l != BACKGROUND).count();
        assert_eq!(inside, total);
    }

    #[test]
    fn test_every_row_rect_holds_labelled_pixels() {
        let gen = generator();
        let page = gen.compose_page(&mut StdRng::seed_from_u64(5)).unwrap();
        for row in &page.meta.rows {
            assert!(row.size[0] > 0 && row.size[1] > 0);
            assert!(
                page.char_mask.count_labelled_in(row.rect()) > 0,
                "row {:?} has no labels",
                row.text
            );
            assert!((-3.0..=3.0).contains(&row.angle));
        }
    }

    #[test]
    fn test_zero_row_budget_still_yields_a_page() {
        let gen = generator_from(&CONFIG.replace("rows_per_page = [5, 12]", "rows_per_page = [0, 0]"));
        let page = gen.compose_page(&mut StdRng::seed_from_u64(2)).unwrap();
        assert!(page.meta.rows.is_empty());
        assert_eq!(page.image.dimensions(), (300, 240));
    }

    #[test]
    fn test_disabled_table_leaves_field_mask_empty() {
        let gen = generator_from(&CONFIG.replace("cells = [2, 3]", "enabled = false"));
        let page = gen.compose_page(&mut StdRng::seed_from_u64(2)).unwrap();
        assert!(page.meta.table.is_none());
        assert_eq!(page.field_mask.count(FIELD_TABLE), 0);
    }

    #[test]
    fn test_same_seed_same_page() {
        let gen = generator();
        let a = gen.compose_page(&mut StdRng::seed_from_u64(9)).unwrap();
        let b = gen.compose_page(&mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.meta, b.meta);
        assert_eq!(a.char_mask.labels(), b.char_mask.labels());
    }

    #[test]
    fn test_batches_continue_ids() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputDir::create(dir.path()).unwrap();
        let gen = generator();

        let first = gen.run_into(&out, 2).unwrap();
        assert_eq!(first, BatchReport { produced: 2, failed: 0, first_id: 0 });
        let second = gen.run_into(&out, 2).unwrap();
        assert_eq!(second.first_id, 2);
        assert_eq!(second.produced, 2);
        for id in 0..4 {
            assert!(out.image_path(id).is_file());
            assert!(out.meta_path(id).is_file());
        }
    }

    #[test]
    fn test_page_seeds_differ_per_index() {
        assert_ne!(page_seed(1, 0), page_seed(1, 1));
        assert_ne!(page_seed(1, 0), page_seed(2, 0));
        assert_eq!(page_seed(5, 3), page_seed(5, 3));
    }
}
