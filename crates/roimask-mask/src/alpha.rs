//! Alpha-channel mask extraction and translucent overlay previews.

use roimask_types::{config::MaskConfig, frame::RasterImage, Result};

use crate::{geometry_error, pixel_mask::PixelMask};

/// Only fully opaque pixels count as part of a server-computed region.
pub const ALPHA_THRESHOLD: u8 = 254;

/// Colour and opacity of the mask preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub color: [u8; 3],
    pub opacity: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0],
            opacity: 0.39,
        }
    }
}

impl From<&MaskConfig> for OverlayStyle {
    fn from(config: &MaskConfig) -> Self {
        Self {
            color: config.overlay_color,
            opacity: config.overlay_opacity,
        }
    }
}

pub fn extract_alpha_mask(raster: &RasterImage) -> PixelMask {
    extract_alpha_mask_with(raster, ALPHA_THRESHOLD)
}

/// Same as [`extract_alpha_mask`] with a configurable cut-off.
pub fn extract_alpha_mask_with(raster: &RasterImage, threshold: u8) -> PixelMask {
    PixelMask::from_alpha(raster, threshold)
}

/// Composites `style` over a copy of `raster` (source-over) wherever the
/// mask is set. Unmasked pixels are copied unchanged.
pub fn apply_mask_overlay(
    raster: &RasterImage,
    mask: &PixelMask,
    style: &OverlayStyle,
) -> Result<RasterImage> {
    if raster.dimensions() != mask.dimensions() {
        return Err(geometry_error(format!(
            "overlay needs matching sizes: image {:?}, mask {:?}",
            raster.dimensions(),
            mask.dimensions()
        )));
    }

    let mut preview = raster.clone();
    let overlay_alpha = style.opacity.clamp(0.0, 1.0);
    let pixels = preview.data_mut().chunks_exact_mut(4);
    for (px, cell) in pixels.zip(mask.cells()) {
        if *cell == 0 {
            continue;
        }
        let src_alpha = f32::from(px[3]) / 255.0;
        let out_alpha = overlay_alpha + src_alpha * (1.0 - overlay_alpha);
        if out_alpha <= 0.0 {
            px.copy_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        for channel in 0..3 {
            let over = f32::from(style.color[channel]) * overlay_alpha;
            let under = f32::from(px[channel]) * src_alpha * (1.0 - overlay_alpha);
            px[channel] = ((over + under) / out_alpha).round().clamp(0.0, 255.0) as u8;
        }
        px[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    Ok(preview)
}

/// Overlay drawn on a fully transparent layer the size of `mask`.
pub fn render_overlay_layer(mask: &PixelMask, style: &OverlayStyle) -> Result<RasterImage> {
    let layer = RasterImage::filled(mask.width(), mask.height(), [0, 0, 0, 0]);
    apply_mask_overlay(&layer, mask, style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::stamp_circle;

    fn sample_mask() -> PixelMask {
        let mut mask = PixelMask::new(24, 16);
        stamp_circle(&mut mask, 8, 8, 5);
        mask.set(20, 2, true);
        mask
    }

    #[test]
    fn overlay_leaves_source_untouched() {
        let raster = RasterImage::filled(24, 16, [10, 20, 30, 255]);
        let original = raster.data().to_vec();
        let preview =
            apply_mask_overlay(&raster, &sample_mask(), &OverlayStyle::default()).expect("overlay");
        assert_eq!(raster.data(), original.as_slice());
        assert_ne!(preview.data(), raster.data());
        assert_eq!(preview.pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn default_overlay_tints_masked_pixels_red() {
        let raster = RasterImage::filled(24, 16, [0, 0, 255, 255]);
        let preview =
            apply_mask_overlay(&raster, &sample_mask(), &OverlayStyle::default()).expect("overlay");
        let [r, g, b, a] = preview.pixel(8, 8).expect("pixel");
        assert_eq!(a, 255);
        assert_eq!(g, 0);
        assert_eq!(r, 99);
        assert_eq!(b, 156);
    }

    #[test]
    fn opaque_overlay_round_trips_through_alpha() {
        let mask = sample_mask();
        let style = OverlayStyle {
            color: [255, 0, 0],
            opacity: 1.0,
        };
        let layer = render_overlay_layer(&mask, &style).expect("layer");
        assert_eq!(extract_alpha_mask(&layer), mask);

        let translucent = RasterImage::filled(24, 16, [40, 40, 40, 128]);
        let preview = apply_mask_overlay(&translucent, &mask, &style).expect("overlay");
        assert_eq!(extract_alpha_mask(&preview), mask);
    }

    #[test]
    fn translucent_overlay_stays_below_threshold() {
        let mask = sample_mask();
        let layer = render_overlay_layer(&mask, &OverlayStyle::default()).expect("layer");
        assert!(extract_alpha_mask(&layer).is_blank());
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let raster = RasterImage::filled(10, 10, [0, 0, 0, 255]);
        let err = apply_mask_overlay(&raster, &PixelMask::new(10, 9), &OverlayStyle::default())
            .expect_err("size mismatch");
        assert!(matches!(err, roimask_types::RoiError::Geometry(_)));
    }
}
