//! Flat binary mask buffer.

use roimask_types::{frame::RasterImage, Result};

use crate::codec_error;

/// Row-major grid of 0/1 cells, indexed by `y * width + x`.
///
/// Coordinates are signed so that brush stamps straddling the image edge can
/// be passed straight through; anything outside `[0, width) x [0, height)`
/// reads as unset and ignores writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl PixelMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width as usize * height as usize],
        }
    }

    /// Blank mask sized to match `raster`.
    pub fn for_raster(raster: &RasterImage) -> Self {
        Self::new(raster.width(), raster.height())
    }

    /// Cell is set where the alpha byte strictly exceeds `threshold`.
    pub fn from_alpha(raster: &RasterImage, threshold: u8) -> Self {
        let cells = raster
            .alpha_channel()
            .map(|alpha| u8::from(alpha > threshold))
            .collect();
        Self {
            width: raster.width(),
            height: raster.height(),
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_zero_area(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|idx| self.cells[idx] != 0)
    }

    pub fn set(&mut self, x: i32, y: i32, bit: bool) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = u8::from(bit);
        }
    }

    pub fn fill(&mut self, bit: bool) {
        self.cells.fill(u8::from(bit));
    }

    pub fn for_each_cell<F>(&self, mut f: F)
    where
        F: FnMut(u32, u32, bool),
    {
        if self.width == 0 {
            return;
        }
        for (idx, cell) in self.cells.iter().enumerate() {
            let x = (idx % self.width as usize) as u32;
            let y = (idx / self.width as usize) as u32;
            f(x, y, *cell != 0);
        }
    }

    /// True when no cell is set (including zero-sized masks).
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|cell| *cell == 0)
    }

    pub fn count_set(&self) -> usize {
        self.cells.iter().filter(|cell| **cell != 0).count()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// One `Vec` of 0/1 per row, top to bottom.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        if self.width == 0 {
            return vec![Vec::new(); self.height as usize];
        }
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.to_vec())
            .collect()
    }

    /// JSON 2-D array of bits, e.g. `[[0,1],[1,1]]`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_rows())
            .map_err(|err| codec_error(format!("failed to serialise mask: {err}")))
    }
}
