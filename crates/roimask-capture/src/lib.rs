//! Video and still-image sources feeding the editor.

mod still;

pub use still::{validate_upload_name, StillImage};

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roimask_types::{config::CaptureConfig, frame::RasterImage, Result, RoiError};
use tracing::{debug, info, warn};

/// Aggregated capture counters.
#[derive(Debug, Default, Clone)]
pub struct CaptureMetrics {
    pub frames_captured: u64,
    pub failed_captures: u64,
    pub last_capture_at: Option<DateTime<Utc>>,
}

/// Continuous frame source such as a camera.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Acquires the device. Permission denial surfaces as `RoiError::Capture`.
    async fn open(&mut self) -> Result<()>;
    async fn capture_frame(&self) -> Result<RasterImage>;
    async fn close(&mut self) -> Result<()>;
    fn is_open(&self) -> bool;
    fn metrics(&self) -> CaptureMetrics;
}

/// Camera stand-in that renders a moving test pattern.
pub struct SyntheticCamera {
    config: CaptureConfig,
    available: bool,
    open: AtomicBool,
    frame_index: AtomicU64,
    metrics: Arc<Mutex<CaptureMetrics>>,
}

impl SyntheticCamera {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            available: true,
            open: AtomicBool::new(false),
            frame_index: AtomicU64::new(0),
            metrics: Arc::new(Mutex::new(CaptureMetrics::default())),
        }
    }

    /// Camera whose `open` fails as if access were denied.
    pub fn unavailable(config: CaptureConfig) -> Self {
        Self {
            available: false,
            ..Self::new(config)
        }
    }

    fn render(&self, index: u64) -> Result<RasterImage> {
        let (width, height) = (self.config.frame_width, self.config.frame_height);
        let bar = if width == 0 { 0 } else { (index % u64::from(width)) as u32 };
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let lit = x.abs_diff(bar) < 8;
                let shade = ((x ^ y) & 0xFF) as u8;
                if lit {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    data.extend_from_slice(&[shade, shade / 2, 96, 255]);
                }
            }
        }
        RasterImage::from_rgba(width, height, data)
    }

    fn record(&self, ok: bool) {
        if let Ok(mut guard) = self.metrics.lock() {
            if ok {
                guard.frames_captured += 1;
                guard.last_capture_at = Some(Utc::now());
            } else {
                guard.failed_captures += 1;
            }
        }
    }
}

#[async_trait]
impl VideoSource for SyntheticCamera {
    async fn open(&mut self) -> Result<()> {
        if !self.available {
            warn!("Camera '{}' refused access", self.config.device);
            return Err(capture_error(format!(
                "access to camera '{}' was denied",
                self.config.device
            )));
        }
        info!(
            "Opened synthetic camera '{}' at {}x{}",
            self.config.device, self.config.frame_width, self.config.frame_height
        );
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn capture_frame(&self) -> Result<RasterImage> {
        if !self.is_open() {
            self.record(false);
            return Err(capture_error("camera is not open"));
        }
        let index = self.frame_index.fetch_add(1, Ordering::SeqCst);
        let frame = self.render(index)?;
        debug!("Captured synthetic frame {}", index);
        self.record(true);
        Ok(frame)
    }

    async fn close(&mut self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("Closed synthetic camera '{}'", self.config.device);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn metrics(&self) -> CaptureMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

/// Generate an error aligned with capture semantics.
pub fn capture_error(message: impl Into<String>) -> RoiError {
    RoiError::Capture(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CaptureConfig {
        CaptureConfig {
            device: "test".into(),
            frame_width: 32,
            frame_height: 16,
        }
    }

    #[tokio::test]
    async fn frames_require_an_open_camera() {
        let mut camera = SyntheticCamera::new(small_config());
        assert!(camera.capture_frame().await.is_err());

        camera.open().await.expect("open");
        let frame = camera.capture_frame().await.expect("frame");
        assert_eq!(frame.dimensions(), (32, 16));
        assert!(frame.alpha_channel().all(|a| a == 255));

        let metrics = camera.metrics();
        assert_eq!(metrics.frames_captured, 1);
        assert_eq!(metrics.failed_captures, 1);

        camera.close().await.expect("close");
        assert!(!camera.is_open());
    }

    #[tokio::test]
    async fn denied_camera_reports_capture_error() {
        let mut camera = SyntheticCamera::unavailable(small_config());
        let err = camera.open().await.expect_err("denied");
        assert!(matches!(err, RoiError::Capture(_)));
        assert!(!camera.is_open());
    }

    #[tokio::test]
    async fn consecutive_frames_differ() {
        let mut camera = SyntheticCamera::new(small_config());
        camera.open().await.expect("open");
        let first = camera.capture_frame().await.expect("frame");
        let second = camera.capture_frame().await.expect("frame");
        assert_ne!(first.data(), second.data());
    }
}
