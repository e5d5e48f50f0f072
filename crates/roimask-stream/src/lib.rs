//! Throttled frame capture and exchange with the remote processor.

mod clock;
mod throttle;

pub use clock::{Clock, ManualClock, SystemClock};
pub use throttle::SendThrottle;

use std::time::Duration;

use chrono::Utc;
use futures::stream::BoxStream;
use roimask_capture::VideoSource;
use roimask_mask::encoding::{decode_image, encode_jpeg, resize_raster};
use roimask_network::{FrameTransport, SendRejected};
use roimask_types::{
    config::{CaptureConfig, StreamConfig},
    frame::{EncodedFrame, RasterImage},
    stream::{InboundMessage, StreamState},
    telemetry::StreamMetrics,
    Result, RoiError,
};
use tracing::{debug, info, warn};

/// Why a tick produced no outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotOpen,
    QueueFull,
    Disconnected,
    CaptureFailed,
    EncodeFailed,
}

/// Result of a single capture tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent { bytes: usize },
    Throttled,
    Dropped(DropReason),
    /// Streamer is not in `Streaming`; nothing was captured.
    Inactive,
}

pub struct FrameStreamer<S, T, C>
where
    S: VideoSource,
    T: FrameTransport,
    C: Clock,
{
    source: S,
    transport: T,
    clock: C,
    frame_size: (u32, u32),
    jpeg_quality: u8,
    state: StreamState,
    throttle: SendThrottle,
    metrics: StreamMetrics,
}

impl<S, T, C> FrameStreamer<S, T, C>
where
    S: VideoSource,
    T: FrameTransport,
    C: Clock,
{
    pub fn new(
        stream: &StreamConfig,
        capture: &CaptureConfig,
        source: S,
        transport: T,
        clock: C,
    ) -> Self {
        Self {
            source,
            transport,
            clock,
            frame_size: (capture.frame_width, capture.frame_height),
            jpeg_quality: stream.jpeg_quality,
            state: StreamState::Idle,
            throttle: SendThrottle::new(Duration::from_millis(stream.min_send_interval_ms)),
            metrics: StreamMetrics::default(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Opens the video source and the channel, then enters `Streaming`.
    ///
    /// A source that cannot be opened leaves the streamer in `Idle`; a
    /// channel that cannot be opened ends in `Closed`.
    pub async fn start(&mut self, endpoint: &str) -> Result<()> {
        match self.state {
            StreamState::Idle | StreamState::Closed => {}
            StreamState::Streaming | StreamState::Connecting => {
                return Err(RoiError::Transport(format!(
                    "stream already active ({:?})",
                    self.state
                )));
            }
            StreamState::Errored => self.state = StreamState::Closed,
        }

        if !self.source.is_open() {
            if let Err(err) = self.source.open().await {
                warn!("Video source unavailable: {}", err);
                self.state = StreamState::Idle;
                return Err(err);
            }
        }

        self.transition(StreamState::Connecting);
        if let Err(err) = self.transport.connect(endpoint).await {
            warn!("Failed to open stream to {}: {}", endpoint, err);
            self.fail().await;
            return Err(err);
        }

        self.throttle.reset();
        self.transition(StreamState::Streaming);
        info!("Streaming frames to {}", endpoint);
        Ok(())
    }

    /// Samples the source once. Frames arriving before the send interval has
    /// elapsed are dropped; the call never waits on the remote side. Only a
    /// frame the transport accepted starts a new interval.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.state != StreamState::Streaming {
            return TickOutcome::Inactive;
        }

        let status = self.transport.status();
        if status.is_terminal() {
            warn!("Stream transport is {:?}; closing stream", status);
            self.fail().await;
            return TickOutcome::Dropped(DropReason::Disconnected);
        }

        let now = self.clock.now();
        if !self.throttle.is_ready(now) {
            self.metrics.frames_throttled += 1;
            return TickOutcome::Throttled;
        }
        if !status.is_open() {
            self.metrics.frames_dropped += 1;
            return TickOutcome::Dropped(DropReason::NotOpen);
        }

        let frame = match self.source.capture_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Frame capture failed: {}", err);
                self.metrics.frames_dropped += 1;
                return TickOutcome::Dropped(DropReason::CaptureFailed);
            }
        };
        let encoded = match self.encode_frame(&frame) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("Frame encoding failed: {}", err);
                self.metrics.frames_dropped += 1;
                return TickOutcome::Dropped(DropReason::EncodeFailed);
            }
        };

        let bytes = encoded.payload.len();
        match self.transport.try_send(encoded.payload) {
            Ok(()) => {
                self.throttle.mark_sent(now);
                self.metrics.frames_sent += 1;
                self.metrics.bytes_sent += bytes as u64;
                self.metrics.last_sent_at = Some(Utc::now());
                debug!("Sent frame ({} bytes)", bytes);
                TickOutcome::Sent { bytes }
            }
            Err(SendRejected::NotOpen) => {
                self.metrics.frames_dropped += 1;
                TickOutcome::Dropped(DropReason::NotOpen)
            }
            Err(SendRejected::Full) => {
                debug!("Outbound queue full; frame dropped");
                self.metrics.frames_dropped += 1;
                TickOutcome::Dropped(DropReason::QueueFull)
            }
            Err(SendRejected::Disconnected) => {
                warn!("Transport disconnected while sending");
                self.metrics.frames_dropped += 1;
                self.fail().await;
                TickOutcome::Dropped(DropReason::Disconnected)
            }
        }
    }

    /// Resizes to the configured frame size and JPEG-encodes.
    pub fn encode_frame(&self, frame: &RasterImage) -> Result<EncodedFrame> {
        let (width, height) = self.frame_size;
        let resized = resize_raster(frame, width, height)?;
        Ok(EncodedFrame {
            payload: encode_jpeg(&resized, self.jpeg_quality)?,
            captured_at: frame.captured_at,
        })
    }

    pub fn inbound(&self) -> BoxStream<'static, InboundMessage> {
        self.transport.inbound()
    }

    /// Decodes a message from the remote processor. Text and undecodable
    /// payloads are logged and dropped; nothing is accepted once closed.
    pub fn decode_inbound(&mut self, message: InboundMessage) -> Option<RasterImage> {
        if self.state == StreamState::Closed {
            debug!("Ignoring inbound message after close");
            return None;
        }
        match message {
            InboundMessage::Binary(bytes) => match decode_image(&bytes) {
                Ok(image) => {
                    self.metrics.inbound_accepted += 1;
                    Some(image)
                }
                Err(err) => {
                    warn!("Dropping undecodable inbound payload ({} bytes): {}", bytes.len(), err);
                    self.metrics.inbound_rejected += 1;
                    None
                }
            },
            InboundMessage::Text(text) => {
                warn!("Dropping non-binary inbound message ({} bytes)", text.len());
                self.metrics.inbound_rejected += 1;
                None
            }
        }
    }

    /// Closes the channel and the source. Later ticks are no-ops.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state == StreamState::Closed {
            return Ok(());
        }
        self.transition(StreamState::Closed);
        let closed = self.transport.close().await;
        self.source.close().await?;
        closed
    }

    /// `Errored -> Closed`, abandoning whatever was in flight.
    async fn fail(&mut self) {
        self.transition(StreamState::Errored);
        if let Err(err) = self.transport.close().await {
            warn!("Failed to release transport: {}", err);
        }
        self.transition(StreamState::Closed);
    }

    fn transition(&mut self, next: StreamState) {
        if self.state != next {
            debug!("Stream state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
