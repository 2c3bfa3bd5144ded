use docsynth_rust::{
    BackgroundSource, Color, FontPool, Generator, GeneratorConfig, GlyphFont, OutputDir, PageMeta,
    Paver, RowRenderer, TextSource,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::sync::Arc;
use ttf_parser::OutlineBuilder;

/// Square glyphs on a 1000-unit em
struct SquareFont;

impl GlyphFont for SquareFont {
    fn name(&self) -> &str {
        "square"
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
            700.0
        }
    }
    fn outline(&self, ch: char, builder: &mut dyn OutlineBuilder) -> bool {
        if ch == ' ' {
            return false;
        }
        builder.move_to(50.0, 0.0);
        builder.line_to(650.0, 0.0);
        builder.line_to(650.0, 600.0);
        builder.line_to(50.0, 600.0);
        builder.close();
        true
    }
}

const CONFIG: &str = r#"
    [generator]
    alphabet = "xyz"
    rows_per_page = [3, 6]
    seed = 11
    threads = 2

    [background]
    size = [320, 256]
    color = { r = 240, g = 240, b = 230 }

    [row]
    fonts_path = "unused"
    font_size = [18.0, 26.0]

    [table]
    cells = [2, 2]
    cell_padding = [8, 3]

    [text]
    kind = "random"
    words_in_row = [1, 2]
    max_word_len = 3
"#;

fn generator() -> Generator {
    let config = GeneratorConfig::from_toml(CONFIG).unwrap();
    let fonts = FontPool::from_fonts(vec![Arc::new(SquareFont) as Arc<dyn GlyphFont>]).unwrap();
    let text = TextSource::from_config(&config.text, &config.generator.alphabet).unwrap();
    let rows = RowRenderer::new(&config.generator.alphabet, fonts, text, &config.row).unwrap();
    let background = BackgroundSource::Solid(config.background.color);
    Generator::with_parts(config, rows, background)
}

fn npy_shape(bytes: &[u8]) -> (String, usize) {
    assert_eq!(&bytes[..6], b"\x93NUMPY");
    let len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let header = std::str::from_utf8(&bytes[10..10 + len]).unwrap().to_string();
    (header, 10 + len)
}

#[test]
fn test_paver_refuses_block_after_large_placement() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut paver = Paver::new(100, 100);
    let (x, y) = paver.place(50, 50, &mut rng).unwrap();
    assert!(x <= 50 && y <= 50);
    assert!(paver.place(90, 90, &mut rng).is_none());
}

#[test]
fn test_batch_writes_consistent_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let out = OutputDir::create(dir.path()).unwrap();
    let report = generator().run_into(&out, 3).unwrap();
    assert_eq!(report.produced, 3);
    assert_eq!(report.failed, 0);

    for id in 0..3 {
        let image = image::open(out.image_path(id)).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (320, 256));

        let chars = fs::read(out.char_mask_path(id)).unwrap();
        let (header, offset) = npy_shape(&chars);
        assert!(header.contains("'descr': '<f4'"));
        assert!(header.contains("'shape': (4, 256, 320)"), "{header}");
        assert_eq!(chars.len() - offset, 4 * 256 * 320 * 4);

        let fields = fs::read(out.field_mask_path(id)).unwrap();
        let (header, offset) = npy_shape(&fields);
        assert!(header.contains("'shape': (2, 256, 320)"), "{header}");
        assert_eq!(fields.len() - offset, 2 * 256 * 320 * 4);

        let meta: PageMeta =
            serde_json::from_str(&fs::read_to_string(out.meta_path(id)).unwrap()).unwrap();
        assert!(!meta.rows.is_empty());
        for row in &meta.rows {
            let rect = row.rect();
            assert!(rect.right() <= 320 && rect.bottom() <= 256);
            assert!(row.text.chars().all(|c| c == ' ' || "xyz".contains(c)));
        }
    }
}

#[test]
fn test_rows_in_json_overlap_labelled_mask_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let out = OutputDir::create(dir.path()).unwrap();
    generator().run_into(&out, 1).unwrap();

    let chars = fs::read(out.char_mask_path(0)).unwrap();
    let (_, offset) = npy_shape(&chars);
    let plane = 256 * 320;
    let background: Vec<f32> = chars[offset..offset + plane * 4]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let meta: PageMeta =
        serde_json::from_str(&fs::read_to_string(out.meta_path(0)).unwrap()).unwrap();
    for row in &meta.rows {
        let rect = row.rect();
        let labelled = (rect.y..rect.bottom())
            .flat_map(|y| (rect.x..rect.right()).map(move |x| (x, y)))
            .filter(|&(x, y)| background[(y * 320 + x) as usize] == 0.0)
            .count();
        assert!(labelled > 0, "row {:?} at {:?}", row.text, rect);
    }
}

#[test]
fn test_second_batch_continues_after_existing_ids() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("images")).unwrap();
    fs::write(dir.path().join("images").join("41.png"), b"").unwrap();

    let out = OutputDir::create(dir.path()).unwrap();
    let report = generator().run_into(&out, 2).unwrap();
    assert_eq!(report.first_id, 42);
    assert!(out.image_path(42).is_file());
    assert!(out.image_path(43).is_file());
    assert!(out.meta_path(43).is_file());
}

#[test]
fn test_background_colour_shows_outside_blocks() {
    let mut generator_rng = StdRng::seed_from_u64(0);
    let page = generator().compose_page(&mut generator_rng).unwrap();
    let mut blocks: Vec<_> = page.meta.rows.iter().map(|r| r.rect()).collect();
    blocks.extend(page.meta.table.iter().map(|t| t.rect()));
    let outside = (0..256u32)
        .flat_map(|y| (0..320u32).map(move |x| (x, y)))
        .find(|&(x, y)| {
            !blocks
                .iter()
                .any(|r| x >= r.x && x < r.right() && y >= r.y && y < r.bottom())
        })
        .unwrap();
    let expected = Color::rgb(240, 240, 230);
    assert_eq!(
        page.image.get_pixel(outside.0, outside.1).0,
        [expected.r, expected.g, expected.b]
    );
}
