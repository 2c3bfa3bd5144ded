//! On-disk layout of generated pages
//!
//! ```text
//! <root>/images/{id}.png
//! <root>/char_masks/{id}.npy
//! <root>/field_masks/{id}.npy
//! <root>/row_coords/{id}.json
//! ```
//!
//! A page's four files are written under temporary names first and renamed
//! into place together, image last, so a page id either has all of its
//! artifacts or none of them.

use image::ImageFormat;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::GeneratorResult;
use crate::generator::Page;
use crate::npy;

pub const IMAGES_DIR: &str = "images";
pub const CHAR_MASKS_DIR: &str = "char_masks";
pub const FIELD_MASKS_DIR: &str = "field_masks";
pub const ROW_COORDS_DIR: &str = "row_coords";

const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Open `root`, creating it and its sub-folders when missing
    pub fn create(root: &Path) -> GeneratorResult<Self> {
        for dir in [IMAGES_DIR, CHAR_MASKS_DIR, FIELD_MASKS_DIR, ROW_COORDS_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image_path(&self, id: u64) -> PathBuf {
        self.root.join(IMAGES_DIR).join(format!("{id}.png"))
    }

    pub fn char_mask_path(&self, id: u64) -> PathBuf {
        self.root.join(CHAR_MASKS_DIR).join(format!("{id}.npy"))
    }

    pub fn field_mask_path(&self, id: u64) -> PathBuf {
        self.root.join(FIELD_MASKS_DIR).join(format!("{id}.npy"))
    }

    pub fn meta_path(&self, id: u64) -> PathBuf {
        self.root.join(ROW_COORDS_DIR).join(format!("{id}.json"))
    }

    /// One past the highest numeric image id already present, 0 for an empty folder
    pub fn next_id(&self) -> GeneratorResult<u64> {
        let mut next = 0;
        for entry in fs::read_dir(self.root.join(IMAGES_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                next = next.max(id + 1);
            }
        }
        Ok(next)
    }

    /// Persist all artifacts of `page` under `id`, or none of them
    pub fn write_page(&self, id: u64, page: &Page) -> GeneratorResult<()> {
        // Rename order: metadata and masks first, the image last
        let finals = [
            self.meta_path(id),
            self.char_mask_path(id),
            self.field_mask_path(id),
            self.image_path(id),
        ];
        let temps: Vec<PathBuf> = finals.iter().map(|p| tmp_path(p)).collect();

        if let Err(e) = write_temps(page, &temps) {
            remove_all(&temps);
            return Err(e);
        }

        for (i, (tmp, dst)) in temps.iter().zip(finals.iter()).enumerate() {
            if let Err(e) = fs::rename(tmp, dst) {
                remove_all(&temps[i..]);
                remove_all(&finals[..i]);
                return Err(e.into());
            }
        }
        Ok(())
    }
}

fn write_temps(page: &Page, temps: &[PathBuf]) -> GeneratorResult<()> {
    let mut writer = BufWriter::new(File::create(&temps[0])?);
    serde_json::to_writer_pretty(&mut writer, &page.meta)?;
    writer.flush()?;

    npy::save_mask(&temps[1], &page.char_mask)?;
    npy::save_mask(&temps[2], &page.field_mask)?;
    page.image.save_with_format(&temps[3], ImageFormat::Png)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("could not remove {}: {}", path.display(), e);
            }
        }
    }
}
