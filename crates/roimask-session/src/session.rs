//! Single-timeline editing state: the base image, its mask, and the pointer.

use roimask_mask::{
    apply_mask_overlay, can_begin_stroke, close_enclosed_areas_in_place, encoding::encode_png,
    extract_alpha_mask_with, stroke_to, BrushRadius, OverlayStyle, PixelMask,
};
use roimask_types::{
    config::{BrushConfig, MaskConfig},
    frame::{ExportPair, RasterImage},
    geometry::{Point, Stroke},
    telemetry::SessionTelemetry,
    Result, RoiError,
};
use tracing::{debug, info};

/// Where a new base image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseImageOrigin {
    /// Still from the live camera; starts with a blank mask.
    Capture,
    /// Image returned by the upload endpoint; alpha seeds the mask.
    Upload,
    /// Image returned over the stream; alpha seeds the mask.
    Inbound,
}

/// Effect of a pointer-down or pointer-move event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerResponse {
    /// No image is loaded, or the pointer is not down.
    Ignored,
    Drawing,
    /// Brush does not touch existing paint; the mask was left alone.
    Suppressed,
}

/// Outcome of releasing the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeSummary {
    pub painted: bool,
    pub filled_cells: usize,
    pub set_cells: usize,
}

#[derive(Debug, Clone)]
struct Canvas {
    image: RasterImage,
    mask: PixelMask,
}

/// Owns the image/mask pair and routes pointer events to the brush.
#[derive(Debug)]
pub struct MaskEditorSession {
    canvas: Option<Canvas>,
    radius: BrushRadius,
    overlay: OverlayStyle,
    alpha_threshold: u8,
    stroke: Option<Stroke>,
    drawing_enabled: bool,
    painted_this_stroke: bool,
    telemetry: SessionTelemetry,
}

impl MaskEditorSession {
    pub fn new(brush: &BrushConfig, mask: &MaskConfig) -> Self {
        Self {
            canvas: None,
            radius: BrushRadius::from_config(brush),
            overlay: OverlayStyle::from(mask),
            alpha_threshold: mask.alpha_threshold,
            stroke: None,
            drawing_enabled: false,
            painted_this_stroke: false,
            telemetry: SessionTelemetry::default(),
        }
    }

    /// No base image yet; pointer events are ignored.
    pub fn is_idle(&self) -> bool {
        self.canvas.is_none()
    }

    pub fn image(&self) -> Option<&RasterImage> {
        self.canvas.as_ref().map(|canvas| &canvas.image)
    }

    pub fn mask(&self) -> Option<&PixelMask> {
        self.canvas.as_ref().map(|canvas| &canvas.mask)
    }

    pub fn brush_radius(&self) -> u32 {
        self.radius.get()
    }

    pub fn set_brush_radius(&mut self, radius: u32) -> u32 {
        self.radius.set(radius)
    }

    pub fn is_pointer_down(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn telemetry(&self) -> &SessionTelemetry {
        &self.telemetry
    }

    /// Replaces the image and mask wholesale and abandons any active stroke.
    pub fn load_base_image(&mut self, image: RasterImage, origin: BaseImageOrigin) {
        let mask = match origin {
            BaseImageOrigin::Capture => PixelMask::for_raster(&image),
            BaseImageOrigin::Upload | BaseImageOrigin::Inbound => {
                extract_alpha_mask_with(&image, self.alpha_threshold)
            }
        };
        info!(
            "Loaded {:?} base image {}x{} ({} mask cells set)",
            origin,
            image.width(),
            image.height(),
            mask.count_set()
        );
        self.canvas = Some(Canvas { image, mask });
        self.stroke = None;
        self.drawing_enabled = false;
        self.painted_this_stroke = false;
        self.telemetry.base_images_loaded += 1;
    }

    pub fn clear_mask(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.mask.fill(false);
        }
    }

    pub fn pointer_down(&mut self, at: Point) -> PointerResponse {
        if self.stroke.is_some() {
            self.pointer_up();
        }
        let radius = self.radius.get();
        let Some(canvas) = self.canvas.as_mut() else {
            return PointerResponse::Ignored;
        };

        self.stroke = Some(Stroke::begin(at, radius));
        self.painted_this_stroke = false;
        self.drawing_enabled = can_begin_stroke(&canvas.mask, at, radius);
        if !self.drawing_enabled {
            debug!("Stroke at ({}, {}) suppressed: no painted cell in reach", at.x, at.y);
            return PointerResponse::Suppressed;
        }
        stroke_to(&mut canvas.mask, at, at, radius);
        self.painted_this_stroke = true;
        PointerResponse::Drawing
    }

    /// While suppressed, every move re-checks whether the brush now touches
    /// paint; once it does, drawing continues from that point.
    pub fn pointer_move(&mut self, to: Point) -> PointerResponse {
        let (Some(canvas), Some(stroke)) = (self.canvas.as_mut(), self.stroke.as_mut()) else {
            return PointerResponse::Ignored;
        };
        let radius = stroke.brush_radius;
        let from = stroke.advance(to);

        if self.drawing_enabled {
            stroke_to(&mut canvas.mask, from, to, radius);
            return PointerResponse::Drawing;
        }
        if can_begin_stroke(&canvas.mask, to, radius) {
            debug!("Stroke re-enabled at ({}, {})", to.x, to.y);
            self.drawing_enabled = true;
            self.painted_this_stroke = true;
            stroke_to(&mut canvas.mask, to, to, radius);
            return PointerResponse::Drawing;
        }
        PointerResponse::Suppressed
    }

    /// Ends the stroke and fills any region the outline now encloses.
    pub fn pointer_up(&mut self) -> Option<StrokeSummary> {
        self.stroke.take()?;
        let painted = std::mem::take(&mut self.painted_this_stroke);
        self.drawing_enabled = false;
        let canvas = self.canvas.as_mut()?;

        let filled_cells = close_enclosed_areas_in_place(&mut canvas.mask);
        if painted {
            self.telemetry.strokes += 1;
        } else {
            self.telemetry.suppressed_strokes += 1;
        }
        if filled_cells > 0 {
            self.telemetry.regions_filled += 1;
        }
        Some(StrokeSummary {
            painted,
            filled_cells,
            set_cells: canvas.mask.count_set(),
        })
    }

    /// Base image with the translucent mask overlay; the image is not changed.
    pub fn preview(&self) -> Result<RasterImage> {
        let canvas = self.canvas.as_ref().ok_or_else(no_image)?;
        apply_mask_overlay(&canvas.image, &canvas.mask, &self.overlay)
    }

    /// PNG image bytes plus the mask as a JSON array of 0/1 rows.
    pub fn export_pair(&self) -> Result<ExportPair> {
        let canvas = self.canvas.as_ref().ok_or_else(no_image)?;
        Ok(ExportPair {
            image_bytes: encode_png(&canvas.image)?,
            mask_json: canvas.mask.to_json()?,
            width: canvas.image.width(),
            height: canvas.image.height(),
        })
    }
}

fn no_image() -> RoiError {
    RoiError::Session("no base image loaded".into())
}
