use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, RoiError};

/// Upper bound of the adjustable brush radius.
pub const MAX_BRUSH_RADIUS: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub device: String,
    /// Outbound stream frames are resized to these dimensions.
    pub frame_width: u32,
    pub frame_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrushConfig {
    pub default_radius: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskConfig {
    pub alpha_threshold: u8,
    pub overlay_color: [u8; 3],
    pub overlay_opacity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub endpoint: String,
    pub min_send_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub jpeg_quality: u8,
    pub outbound_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub base_url: String,
    pub upload_path: String,
    pub timeout_ms: u64,
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub telemetry_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiConfig {
    pub capture: CaptureConfig,
    pub brush: BrushConfig,
    pub mask: MaskConfig,
    pub stream: StreamConfig,
    pub upload: UploadConfig,
    pub ops: OpsConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "synthetic".into(),
            frame_width: 640,
            frame_height: 640,
        }
    }
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            default_radius: 10,
            min_radius: 1,
            max_radius: MAX_BRUSH_RADIUS,
        }
    }
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: 254,
            overlay_color: [255, 0, 0],
            overlay_opacity: 0.39,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000/ws".into(),
            min_send_interval_ms: 400,
            tick_interval_ms: 16,
            jpeg_quality: 80,
            outbound_capacity: 4,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            upload_path: "/api/upload/".into(),
            timeout_ms: 10_000,
            allowed_extensions: ["dcm", "png", "jpg", "jpeg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            telemetry_dir: "telemetry".into(),
        }
    }
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            brush: BrushConfig::default(),
            mask: MaskConfig::default(),
            stream: StreamConfig::default(),
            upload: UploadConfig::default(),
            ops: OpsConfig::default(),
        }
    }
}

impl UploadConfig {
    pub fn upload_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.upload_path.trim_start_matches('/')
        )
    }
}

impl RoiConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            RoiError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            RoiError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.frame_width == 0 || self.capture.frame_height == 0 {
            return Err(RoiError::Configuration(
                "capture frame dimensions must be greater than zero".into(),
            ));
        }
        let brush = &self.brush;
        if brush.min_radius == 0
            || brush.min_radius > brush.max_radius
            || brush.max_radius > MAX_BRUSH_RADIUS
        {
            return Err(RoiError::Configuration(format!(
                "brush radius bounds must satisfy 1 <= min <= max <= {MAX_BRUSH_RADIUS}"
            )));
        }
        if !(brush.min_radius..=brush.max_radius).contains(&brush.default_radius) {
            return Err(RoiError::Configuration(
                "brush.default_radius must lie within the configured bounds".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mask.overlay_opacity) {
            return Err(RoiError::Configuration(
                "mask.overlay_opacity must be between 0.0 and 1.0".into(),
            ));
        }
        if self.stream.endpoint.trim().is_empty() {
            return Err(RoiError::Configuration(
                "stream.endpoint must not be empty".into(),
            ));
        }
        if self.stream.min_send_interval_ms == 0 || self.stream.tick_interval_ms == 0 {
            return Err(RoiError::Configuration(
                "stream intervals must be greater than zero".into(),
            ));
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(RoiError::Configuration(
                "stream.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.stream.outbound_capacity == 0 {
            return Err(RoiError::Configuration(
                "stream.outbound_capacity must be greater than zero".into(),
            ));
        }
        if self.upload.timeout_ms == 0 {
            return Err(RoiError::Configuration(
                "upload.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
