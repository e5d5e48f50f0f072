use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, RoiError};

/// Bytes per RGBA8 pixel.
pub const RGBA_CHANNELS: usize = 4;

/// Decoded RGBA8 raster, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl RasterImage {
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * RGBA_CHANNELS;
        if data.len() != expected {
            return Err(RoiError::Geometry(format!(
                "RGBA buffer for {width}x{height} must hold {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        })
    }

    /// Raster with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * RGBA_CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::filled(0, 0, [0; 4])
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

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS;
        let px = &self.data[idx..idx + RGBA_CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Iterator over the alpha byte of each pixel in row-major order.
    pub fn alpha_channel(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.chunks_exact(RGBA_CHANNELS).map(|px| px[3])
    }
}

/// Compressed image payload on its way to the remote processor.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub payload: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// Image plus mask prepared for the export endpoint.
#[derive(Debug, Clone)]
pub struct ExportPair {
    /// PNG-encoded base image, sent under the `file` field.
    pub image_bytes: Vec<u8>,
    /// JSON 2-D array of 0/1 rows, sent under the `mask` field.
    pub mask_json: String,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgba_rejects_short_buffers() {
        let err = RasterImage::from_rgba(2, 2, vec![0; 15]).expect_err("short buffer");
        assert!(matches!(err, RoiError::Geometry(_)));
        assert!(RasterImage::from_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() {
        let raster = RasterImage::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(raster.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(raster.pixel(3, 0), None);
        assert_eq!(raster.alpha_channel().count(), 6);
        assert!(RasterImage::empty().is_empty());
    }
}
