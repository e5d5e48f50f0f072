//! Binary region-of-interest masks and the raster algorithms that edit them.

pub mod alpha;
pub mod brush;
pub mod encoding;
pub mod pixel_mask;
pub mod region;

pub use alpha::{
    apply_mask_overlay, extract_alpha_mask, extract_alpha_mask_with, render_overlay_layer,
    OverlayStyle, ALPHA_THRESHOLD,
};
pub use brush::{can_begin_stroke, stamp_circle, stroke_to, touches_painted, BrushRadius};
pub use pixel_mask::PixelMask;
pub use region::{close_enclosed_areas, close_enclosed_areas_in_place};

use roimask_types::RoiError;

pub fn codec_error(message: impl Into<String>) -> RoiError {
    RoiError::Codec(message.into())
}

pub fn geometry_error(message: impl Into<String>) -> RoiError {
    RoiError::Geometry(message.into())
}
