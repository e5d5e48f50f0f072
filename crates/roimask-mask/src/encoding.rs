//! Compressed image encode/decode for frames and exports.

use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    imageops::{self, FilterType},
    ColorType, DynamicImage, ImageBuffer, ImageEncoder, Rgba, RgbaImage,
};
use roimask_types::{frame::RasterImage, Result};

use crate::codec_error;

fn to_buffer(raster: &RasterImage) -> Result<RgbaImage> {
    ImageBuffer::<Rgba<u8>, _>::from_raw(raster.width(), raster.height(), raster.data().to_vec())
        .ok_or_else(|| codec_error("failed to build image buffer"))
}

fn ensure_not_empty(raster: &RasterImage) -> Result<()> {
    if raster.is_empty() {
        Err(codec_error(format!(
            "cannot encode a {}x{} image",
            raster.width(),
            raster.height()
        )))
    } else {
        Ok(())
    }
}

/// JPEG has no alpha channel; the raster is flattened to RGB first.
pub fn encode_jpeg(raster: &RasterImage, quality: u8) -> Result<Vec<u8>> {
    ensure_not_empty(raster)?;
    let rgb = DynamicImage::ImageRgba8(to_buffer(raster)?).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|err| codec_error(format!("JPEG encoding failed: {err}")))?;
    Ok(out)
}

pub fn encode_png(raster: &RasterImage) -> Result<Vec<u8>> {
    ensure_not_empty(raster)?;
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            raster.data(),
            raster.width(),
            raster.height(),
            ColorType::Rgba8,
        )
        .map_err(|err| codec_error(format!("PNG encoding failed: {err}")))?;
    Ok(out)
}

/// Decodes any supported compressed format into RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<RasterImage> {
    if bytes.is_empty() {
        return Err(codec_error("empty image payload"));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|err| codec_error(format!("image decoding failed: {err}")))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    RasterImage::from_rgba(width, height, rgba.into_raw())
}

/// Rescales to exactly `width` x `height`; aspect ratio is not preserved.
pub fn resize_raster(raster: &RasterImage, width: u32, height: u32) -> Result<RasterImage> {
    if raster.dimensions() == (width, height) {
        return Ok(raster.clone());
    }
    ensure_not_empty(raster)?;
    let resized = imageops::resize(&to_buffer(raster)?, width, height, FilterType::Triangle);
    let mut out = RasterImage::from_rgba(width, height, resized.into_raw())?;
    out.captured_at = raster.captured_at;
    Ok(out)
}
