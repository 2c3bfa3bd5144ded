//! Random non-overlapping placement of rectangles on a fixed-size page
//!
//! Each request draws one origin uniformly from the cells that are still
//! free for a block of that size. There is no search for a better fit; a
//! request with no free cell means the page is full for that size.

use rand::Rng;

use crate::types::Rect;

/// Margin kept free around every placed block
pub const DEFAULT_DELTA: u32 = 10;

#[derive(Debug, Clone)]
pub struct Paver {
    width: u32,
    height: u32,
    delta: u32,
    /// Block id per cell, 0 = free
    occupancy: Vec<u32>,
    color: u32,
    /// Placed footprints, already grown by `delta` (may extend past the page)
    exclusions: Vec<Exclusion>,
    placed: Vec<Rect>,
    overlaps: usize,
}

#[derive(Debug, Clone, Copy)]
struct Exclusion {
    top: i64,
    left: i64,
    bottom: i64,
    right: i64,
}

impl Paver {
    pub fn new(height: u32, width: u32) -> Self {
        Self::with_delta(height, width, DEFAULT_DELTA)
    }

    pub fn with_delta(height: u32, width: u32, delta: u32) -> Self {
        Self {
            width,
            height,
            delta,
            occupancy: vec![0; width as usize * height as usize],
            color: 1,
            exclusions: Vec::new(),
            placed: Vec::new(),
            overlaps: 0,
        }
    }

    /// Footprints returned so far, in placement order
    pub fn placed(&self) -> &[Rect] {
        &self.placed
    }

    pub fn occupancy(&self) -> &[u32] {
        &self.occupancy
    }

    /// Cells that were stamped by more than one block (always 0 unless the exclusion logic is broken)
    pub fn overlapping_cells(&self) -> usize {
        self.overlaps
    }

    /// Place a `w` x `h` block; returns its top-left corner or `None` when no space is left
    pub fn place<R: Rng + ?Sized>(&mut self, w: u32, h: u32, rng: &mut R) -> Option<(u32, u32)> {
        let free = self.free_cells(w, h);
        let count = free.iter().filter(|&&f| f).count();
        if count == 0 {
            return None;
        }

        let pick = rng.gen_range(0..count);
        let index = free
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .nth(pick)
            .map(|(i, _)| i)?;
        let x = (index % self.width as usize) as u32;
        let y = (index / self.width as usize) as u32;

        self.stamp(x, y, w, h);
        let delta = self.delta as i64;
        self.exclusions.push(Exclusion {
            top: y as i64 - delta,
            left: x as i64 - delta,
            bottom: (y + h) as i64 + delta,
            right: (x + w) as i64 + delta,
        });
        self.placed.push(Rect::new(x, y, w, h));
        self.color += 1;
        Some((x, y))
    }

    /// Scratch raster of legal origins for a `w` x `h` block (row-major, true = free)
    fn free_cells(&self, w: u32, h: u32) -> Vec<bool> {
        let (width, height) = (self.width as usize, self.height as usize);
        let mut free = vec![true; width * height];
        if w == 0 || h == 0 || w >= self.width || h >= self.height {
            free.iter_mut().for_each(|f| *f = false);
            return free;
        }

        // Origins in the last `h` rows or `w` columns would run off the page
        for y in 0..height {
            let row = &mut free[y * width..(y + 1) * width];
            if y >= height - h as usize {
                row.iter_mut().for_each(|f| *f = false);
            } else {
                row[width - w as usize..].iter_mut().for_each(|f| *f = false);
            }
        }

        // An origin is forbidden when the block would touch an exclusion zone
        for ex in &self.exclusions {
            let y0 = (ex.top - h as i64).max(0) as usize;
            let x0 = (ex.left - w as i64).max(0) as usize;
            let y1 = ex.bottom.clamp(0, height as i64) as usize;
            let x1 = ex.right.clamp(0, width as i64) as usize;
            for y in y0.min(y1)..y1 {
                free[y * width + x0.min(x1)..y * width + x1]
                    .iter_mut()
                    .for_each(|f| *f = false);
            }
        }
        free
    }

    fn stamp(&mut self, x: u32, y: u32, w: u32, h: u32) {
        let width = self.width as usize;
        let x_end = (x + w).min(self.width) as usize;
        let y_end = (y + h).min(self.height) as usize;
        let before = self.overlaps;
        for row in y as usize..y_end {
            for cell in &mut self.occupancy[row * width + x as usize..row * width + x_end] {
                if *cell != 0 {
                    self.overlaps += 1;
                }
                *cell = self.color;
            }
        }
        if self.overlaps > before {
            log::warn!(
                "block {} overlaps earlier placements ({} cells)",
                self.color,
                self.overlaps - before
            );
        }
    }
}
