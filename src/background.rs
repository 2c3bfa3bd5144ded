//! Page backgrounds: a solid colour or images drawn from a folder

use image::{Rgb, RgbImage};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BackgroundConfig;
use crate::error::{GeneratorError, GeneratorResult};
use crate::image_utils::{load_image, resize_rgba};
use crate::types::Color;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Clone)]
pub enum BackgroundSource {
    Solid(Color),
    Images(Vec<PathBuf>),
}

impl BackgroundSource {
    pub fn from_config(config: &BackgroundConfig) -> GeneratorResult<Self> {
        let Some(path) = &config.images_path else {
            return Ok(BackgroundSource::Solid(config.color));
        };
        let images = collect_images(path)?;
        if images.is_empty() {
            return Err(GeneratorError::Config(format!(
                "no background images found in {}",
                path.display()
            )));
        }
        log::info!("Using {} background images from {}", images.len(), path.display());
        Ok(BackgroundSource::Images(images))
    }

    /// Opaque page canvas of exactly `width` x `height`
    pub fn next_background<R: Rng + ?Sized>(
        &self,
        width: u32,
        height: u32,
        rng: &mut R,
    ) -> GeneratorResult<RgbImage> {
        match self {
            BackgroundSource::Solid(color) => {
                Ok(RgbImage::from_pixel(width, height, Rgb([color.r, color.g, color.b])))
            }
            BackgroundSource::Images(paths) => {
                let path = &paths[rng.gen_range(0..paths.len())];
                let img = load_image(path)?;
                let img = if img.dimensions() == (width, height) {
                    img
                } else {
                    resize_rgba(&img, width, height)
                };
                Ok(image::DynamicImage::ImageRgba8(img).to_rgb8())
            }
        }
    }
}

fn collect_images(path: &Path) -> GeneratorResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(GeneratorError::Config(format!(
            "background path {} does not exist",
            path.display()
        )));
    }
    let mut images: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}
