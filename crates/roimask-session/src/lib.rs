//! Editing runtime coordinating capture, mask editing, streaming and upload.

mod session;

pub use session::{BaseImageOrigin, MaskEditorSession, PointerResponse, StrokeSummary};

use std::time::Duration;

use futures::StreamExt;
use roimask_capture::{StillImage, VideoSource};
use roimask_mask::encoding::decode_image;
use roimask_network::{FrameTransport, UploadEndpoint};
use roimask_ops::{ensure_telemetry_dir, init_tracing, TelemetryStore};
use roimask_stream::{Clock, FrameStreamer, TickOutcome};
use roimask_types::{
    config::RoiConfig,
    geometry::Point,
    events::{
        EventKind, EventPayload, ExportEvent, LifecyclePhase, MaskEvent, StreamEvent, SystemEvent,
    },
    frame::RasterImage,
    stream::{InboundMessage, StreamState},
    Result, RoiError,
};
use tokio::{
    sync::{mpsc, watch},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// User input delivered to a running [`EditorRuntime`].
#[derive(Debug, Clone)]
pub enum EditorCommand {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    SetBrushRadius(u32),
    ClearMask,
    CaptureStill,
    Upload(StillImage),
    Export,
}

pub struct EditorRuntime<S, T, C, U>
where
    S: VideoSource,
    T: FrameTransport,
    C: Clock,
    U: UploadEndpoint,
{
    config: RoiConfig,
    session: MaskEditorSession,
    streamer: FrameStreamer<S, T, C>,
    uploader: U,
    telemetry: TelemetryStore,
    status: Option<String>,
}

impl<S, T, C, U> EditorRuntime<S, T, C, U>
where
    S: VideoSource,
    T: FrameTransport,
    C: Clock,
    U: UploadEndpoint,
{
    pub fn new(
        config: RoiConfig,
        source: S,
        transport: T,
        clock: C,
        uploader: U,
        telemetry: TelemetryStore,
    ) -> Self {
        let session = MaskEditorSession::new(&config.brush, &config.mask);
        let streamer = FrameStreamer::new(&config.stream, &config.capture, source, transport, clock);
        Self {
            config,
            session,
            streamer,
            uploader,
            telemetry,
            status: None,
        }
    }

    pub async fn boot(&mut self) -> Result<()> {
        init_tracing(&self.config.ops)?;
        ensure_telemetry_dir(&self.config.ops.telemetry_dir)?;
        self.publish(SystemEvent::lifecycle(
            LifecyclePhase::Boot,
            Some("editor runtime ready".to_string()),
        ))
        .await
    }

    pub fn session(&self) -> &MaskEditorSession {
        &self.session
    }

    /// Direct access while no loop is running; `run_until` takes
    /// [`EditorCommand`]s instead.
    pub fn session_mut(&mut self) -> &mut MaskEditorSession {
        &mut self.session
    }

    pub fn streamer(&self) -> &FrameStreamer<S, T, C> {
        &self.streamer
    }

    /// Latest user-facing failure, if the last operation failed.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Takes a still from the live source as the new base image.
    pub async fn capture_still(&mut self) -> Result<()> {
        let result = self.try_capture_still().await;
        self.settle(result)
    }

    async fn try_capture_still(&mut self) -> Result<()> {
        if !self.streamer.source().is_open() {
            self.streamer.source_mut().open().await?;
            self.publish(SystemEvent::lifecycle(LifecyclePhase::SourceAttached, None))
                .await?;
        }
        let frame = self.streamer.source().capture_frame().await?;
        self.load(frame, BaseImageOrigin::Capture).await
    }

    pub async fn start_stream(&mut self) -> Result<()> {
        let endpoint = self.config.stream.endpoint.clone();
        let result = self.streamer.start(&endpoint).await;
        if result.is_ok() {
            self.publish(SystemEvent::lifecycle(
                LifecyclePhase::StreamStarted,
                Some(endpoint),
            ))
            .await?;
        }
        self.settle(result)
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let before = self.streamer.state();
        let outcome = self.streamer.tick().await;
        if before == StreamState::Streaming && self.streamer.state() == StreamState::Closed {
            self.status = Some(RoiError::Transport(String::new()).status_message().to_string());
            if let Err(err) = self.publish_stream_closed().await {
                warn!("Failed to record stream closure: {}", err);
            }
        }
        outcome
    }

    /// Replaces the base image when the remote processor sends one back.
    /// Returns whether the message was accepted.
    pub async fn handle_inbound(&mut self, message: InboundMessage) -> bool {
        let Some(image) = self.streamer.decode_inbound(message) else {
            return false;
        };
        if let Err(err) = self.load(image, BaseImageOrigin::Inbound).await {
            warn!("Failed to record inbound image: {}", err);
        }
        true
    }

    /// Sends a user-picked file to the upload endpoint and loads the reply.
    pub async fn upload_still(&mut self, still: StillImage) -> Result<()> {
        let result = self.try_upload_still(still).await;
        self.settle(result)
    }

    async fn try_upload_still(&mut self, still: StillImage) -> Result<()> {
        still.validate(&self.config.upload.allowed_extensions)?;
        let reply = self
            .uploader
            .upload_file(&still.file_name, still.bytes)
            .await?;
        let image = decode_image(&reply)?;
        self.load(image, BaseImageOrigin::Upload).await
    }

    /// Ends the current stroke and records what it changed.
    pub async fn release_pointer(&mut self) -> Option<StrokeSummary> {
        let summary = self.session.pointer_up()?;
        if summary.painted || summary.filled_cells > 0 {
            let event = SystemEvent::new(
                EventKind::Mask,
                EventPayload::Mask(MaskEvent {
                    set_cells: summary.set_cells,
                    filled_cells: summary.filled_cells,
                }),
            );
            if let Err(err) = self.publish(event).await {
                warn!("Failed to record stroke: {}", err);
            }
        }
        Some(summary)
    }

    /// Submits the image and mask to the upload endpoint.
    pub async fn export(&mut self) -> Result<Vec<u8>> {
        let result = self.try_export().await;
        self.settle(result)
    }

    async fn try_export(&mut self) -> Result<Vec<u8>> {
        let pair = self.session.export_pair()?;
        let reply = self.uploader.submit_export(&pair).await?;
        self.publish(SystemEvent::new(
            EventKind::Export,
            EventPayload::Export(ExportEvent {
                image_bytes: pair.image_bytes.len(),
                mask_width: pair.width,
                mask_height: pair.height,
            }),
        ))
        .await?;
        Ok(reply)
    }

    /// Routes one command to the session or the matching runtime operation.
    /// Failures are logged and kept as the status line.
    pub async fn apply(&mut self, command: EditorCommand) {
        debug!("Applying {:?}", command);
        match command {
            EditorCommand::PointerDown(at) => {
                self.session.pointer_down(at);
            }
            EditorCommand::PointerMove(to) => {
                self.session.pointer_move(to);
            }
            EditorCommand::PointerUp => {
                self.release_pointer().await;
            }
            EditorCommand::SetBrushRadius(radius) => {
                self.session.set_brush_radius(radius);
            }
            EditorCommand::ClearMask => self.session.clear_mask(),
            EditorCommand::CaptureStill => {
                let _ = self.capture_still().await;
            }
            EditorCommand::Upload(still) => {
                let _ = self.upload_still(still).await;
            }
            EditorCommand::Export => {
                let _ = self.export().await;
            }
        }
    }

    /// Drives ticks, inbound messages and user commands on this task until
    /// `shutdown` turns true or its sender goes away, then tears the stream
    /// down. Commands keep flowing while frames stream.
    pub async fn run_until(
        &mut self,
        mut commands: mpsc::Receiver<EditorCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut inbound = self.streamer.inbound();
        let mut ticker = interval(Duration::from_millis(self.config.stream.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
                Some(message) = inbound.next() => {
                    self.handle_inbound(message).await;
                }
                Some(command) = commands.recv() => {
                    self.apply(command).await;
                }
            }
        }
        self.shutdown().await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        let stopped = self.streamer.stop().await;
        self.telemetry
            .record_session(self.session.telemetry().clone())
            .await?;
        self.publish(SystemEvent::lifecycle(LifecyclePhase::Shutdown, None))
            .await?;
        info!("Editor runtime shut down");
        stopped
    }

    async fn load(
        &mut self,
        image: RasterImage,
        origin: BaseImageOrigin,
    ) -> Result<()> {
        self.session.load_base_image(image, origin);
        self.publish(SystemEvent::lifecycle(
            LifecyclePhase::BaseImageLoaded,
            Some(format!("{origin:?}")),
        ))
        .await
    }

    async fn publish_stream_closed(&self) -> Result<()> {
        self.publish(SystemEvent::new(
            EventKind::Stream,
            EventPayload::Stream(StreamEvent {
                state: self.streamer.state(),
                metrics: self.streamer.metrics().clone(),
            }),
        ))
        .await?;
        self.publish(SystemEvent::lifecycle(LifecyclePhase::StreamClosed, None))
            .await
    }

    async fn publish(&self, event: SystemEvent) -> Result<()> {
        self.telemetry.record_event(event).await
    }

    /// Records the user-facing status for failures and clears it on success.
    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        match &result {
            Ok(_) => self.status = None,
            Err(err) => {
                warn!("Operation failed: {}", err);
                self.status = Some(err.status_message().to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use roimask_capture::SyntheticCamera;
    use roimask_mask::encoding::encode_png;
    use roimask_network::{LocalTransport, RemotePeer};
    use roimask_stream::{ManualClock, SystemClock};
    use roimask_types::{
        frame::ExportPair,
        geometry::Point,
    };

    /// Upload endpoint that echoes a fixed image and records exports.
    #[derive(Clone)]
    struct RecordingUploader {
        reply: Vec<u8>,
        uploads: Arc<Mutex<Vec<String>>>,
        exports: Arc<Mutex<Vec<ExportPair>>>,
    }

    impl RecordingUploader {
        fn new(reply: Vec<u8>) -> Self {
            Self {
                reply,
                uploads: Arc::default(),
                exports: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl UploadEndpoint for RecordingUploader {
        async fn upload_file(&self, file_name: &str, _bytes: Vec<u8>) -> Result<Vec<u8>> {
            self.uploads.lock().expect("lock").push(file_name.to_string());
            Ok(self.reply.clone())
        }

        async fn submit_export(&self, pair: &ExportPair) -> Result<Vec<u8>> {
            self.exports.lock().expect("lock").push(pair.clone());
            Ok(b"ok".to_vec())
        }
    }

    fn test_config() -> RoiConfig {
        let mut config = RoiConfig::default();
        config.capture.frame_width = 24;
        config.capture.frame_height = 24;
        config.brush.default_radius = 2;
        config.stream.endpoint = "local://processor".into();
        config
    }

    /// 8x8 image whose top-left 3x3 block is opaque.
    fn alpha_region_png() -> Vec<u8> {
        let mut data = Vec::new();
        for y in 0..8u32 {
            for x in 0..8u32 {
                let alpha = if x < 3 && y < 3 { 255 } else { 10 };
                data.extend_from_slice(&[200, 100, 50, alpha]);
            }
        }
        let image = RasterImage::from_rgba(8, 8, data).expect("raster");
        encode_png(&image).expect("png")
    }

    type TestRuntime<C> = EditorRuntime<SyntheticCamera, LocalTransport, C, RecordingUploader>;

    fn runtime_with<C: Clock>(
        camera: SyntheticCamera,
        clock: C,
    ) -> (TestRuntime<C>, RemotePeer, RecordingUploader, TelemetryStore) {
        let config = test_config();
        let (transport, peer) = LocalTransport::pair(8);
        let uploader = RecordingUploader::new(alpha_region_png());
        let telemetry = TelemetryStore::new();
        let runtime = EditorRuntime::new(
            config,
            camera,
            transport,
            clock,
            uploader.clone(),
            telemetry.clone(),
        );
        (runtime, peer, uploader, telemetry)
    }

    fn runtime() -> (TestRuntime<ManualClock>, RemotePeer, RecordingUploader, TelemetryStore) {
        runtime_with(
            SyntheticCamera::new(test_config().capture),
            ManualClock::new(),
        )
    }

    #[tokio::test]
    async fn denied_camera_keeps_session_idle() {
        let (mut runtime, _peer, _uploader, _telemetry) = runtime_with(
            SyntheticCamera::unavailable(test_config().capture),
            ManualClock::new(),
        );
        let err = runtime.capture_still().await.expect_err("denied");
        assert!(matches!(err, RoiError::Capture(_)));
        assert!(runtime.session().is_idle());
        assert_eq!(runtime.status(), Some("Could not access the camera."));
    }

    #[tokio::test]
    async fn inbound_frame_replaces_image_and_mask() {
        let (mut runtime, peer, _uploader, telemetry) = runtime();
        runtime.start_stream().await.expect("start");
        let mut inbound = runtime.streamer().inbound();
        peer.reply(InboundMessage::Binary(alpha_region_png()));
        let message = inbound.next().await.expect("message");

        assert!(runtime.handle_inbound(message).await);
        let mask = runtime.session().mask().expect("mask");
        assert_eq!(mask.dimensions(), (8, 8));
        assert_eq!(mask.count_set(), 9);
        assert!(mask.get(2, 2));
        assert!(!mask.get(3, 3));

        let events = telemetry.snapshot_events().await;
        assert!(events.iter().any(|event| matches!(
            &event.payload,
            EventPayload::Lifecycle(lifecycle) if lifecycle.phase == LifecyclePhase::BaseImageLoaded
        )));
    }

    #[tokio::test]
    async fn malformed_inbound_leaves_state_alone() {
        let (mut runtime, _peer, _uploader, _telemetry) = runtime();
        runtime.capture_still().await.expect("capture");
        runtime.start_stream().await.expect("start");
        runtime.session_mut().pointer_down(Point::new(5, 5));
        runtime.release_pointer().await.expect("summary");
        let image_before = runtime.session().image().expect("image").data().to_vec();
        let mask_before = runtime.session().mask().expect("mask").clone();

        assert!(!runtime.handle_inbound(InboundMessage::Text("hello".into())).await);
        assert!(!runtime.handle_inbound(InboundMessage::Binary(vec![1, 2, 3])).await);

        assert_eq!(runtime.session().image().expect("image").data(), image_before.as_slice());
        assert_eq!(runtime.session().mask().expect("mask"), &mask_before);
        assert_eq!(runtime.streamer().state(), StreamState::Streaming);
    }

    #[tokio::test]
    async fn upload_validates_name_and_seeds_mask_from_reply() {
        let (mut runtime, _peer, uploader, _telemetry) = runtime();
        let err = runtime
            .upload_still(StillImage::new("notes.txt", vec![1]))
            .await
            .expect_err("bad extension");
        assert!(matches!(err, RoiError::Upload(_)));
        assert!(uploader.uploads.lock().expect("lock").is_empty());
        assert!(runtime.status().is_some());

        runtime
            .upload_still(StillImage::new("scan.DCM", vec![0xDC]))
            .await
            .expect("upload");
        assert_eq!(runtime.status(), None);
        assert_eq!(
            uploader.uploads.lock().expect("lock").as_slice(),
            ["scan.DCM".to_string()]
        );
        assert_eq!(runtime.session().mask().expect("mask").count_set(), 9);
    }

    #[tokio::test]
    async fn export_submits_image_and_mask() {
        let (mut runtime, _peer, uploader, _telemetry) = runtime();
        assert!(matches!(runtime.export().await, Err(RoiError::Session(_))));

        runtime.capture_still().await.expect("capture");
        runtime.session_mut().pointer_down(Point::new(0, 0));
        runtime.release_pointer().await.expect("summary");
        let reply = runtime.export().await.expect("export");
        assert_eq!(reply, b"ok");

        let exports = uploader.exports.lock().expect("lock");
        let pair = exports.first().expect("export recorded");
        let rows: Vec<Vec<u8>> = serde_json::from_str(&pair.mask_json).expect("json");
        assert_eq!(rows.len(), 24);
        assert_eq!(rows[0].len(), 24);
        assert_eq!(&rows[0][..4], &[1, 1, 1, 0]);
    }

    #[tokio::test]
    async fn transport_drop_keeps_local_editing_available() {
        let (mut runtime, peer, _uploader, telemetry) = runtime();
        runtime.capture_still().await.expect("capture");
        runtime.start_stream().await.expect("start");
        assert!(matches!(runtime.tick().await, TickOutcome::Sent { .. }));

        peer.disconnect();
        runtime.tick().await;
        assert_eq!(runtime.streamer().state(), StreamState::Closed);
        assert_eq!(
            runtime.status(),
            Some("Connection to the processing server was lost.")
        );

        assert_eq!(
            runtime.session_mut().pointer_down(Point::new(3, 3)),
            PointerResponse::Drawing
        );
        assert!(runtime.release_pointer().await.expect("summary").painted);
        let events = telemetry.snapshot_events().await;
        assert!(events.iter().any(|event| event.kind == EventKind::Stream));
    }

    #[tokio::test]
    async fn run_until_streams_then_stops_on_shutdown() {
        let (mut runtime, mut peer, _uploader, telemetry) = runtime_with(
            SyntheticCamera::new(test_config().capture),
            SystemClock::new(),
        );
        runtime.start_stream().await.expect("start");

        let (_commands, command_rx) = mpsc::channel(8);
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let _ = tx.send(true);
        });
        runtime.run_until(command_rx, rx).await.expect("run");

        assert_eq!(runtime.streamer().state(), StreamState::Closed);
        let frames = peer.drain_frames();
        assert!(!frames.is_empty());
        assert!(frames.len() <= 2, "sent {} frames in 150ms", frames.len());
        assert_eq!(telemetry.snapshot_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn outline_drawn_while_streaming_is_filled() {
        let (mut runtime, mut peer, _uploader, telemetry) = runtime_with(
            SyntheticCamera::new(test_config().capture),
            SystemClock::new(),
        );
        runtime.capture_still().await.expect("capture");
        runtime.start_stream().await.expect("start");

        let (commands, command_rx) = mpsc::channel(32);
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            let outline = [
                EditorCommand::PointerDown(Point::new(4, 4)),
                EditorCommand::PointerMove(Point::new(18, 4)),
                EditorCommand::PointerMove(Point::new(18, 18)),
                EditorCommand::PointerMove(Point::new(4, 18)),
                EditorCommand::PointerMove(Point::new(4, 4)),
                EditorCommand::PointerUp,
            ];
            for command in outline {
                commands.send(command).await.expect("runtime listening");
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(true);
        });
        runtime.run_until(command_rx, rx).await.expect("run");

        let mask = runtime.session().mask().expect("mask");
        assert!(mask.get(11, 11), "interior left open");
        assert!(mask.get(4, 11));
        assert!(!mask.get(22, 22));
        assert!(!runtime.session().is_pointer_down());
        assert!(!peer.drain_frames().is_empty());
        let events = telemetry.snapshot_events().await;
        assert!(events.iter().any(|event| matches!(
            &event.payload,
            EventPayload::Mask(stroke) if stroke.filled_cells > 0
        )));
    }

    #[tokio::test]
    async fn inbound_after_close_leaves_state_alone() {
        let (mut runtime, peer, _uploader, _telemetry) = runtime();
        runtime.capture_still().await.expect("capture");
        runtime.start_stream().await.expect("start");
        runtime.session_mut().pointer_down(Point::new(6, 6));
        runtime.release_pointer().await.expect("summary");
        let image_before = runtime.session().image().expect("image").clone();
        let mask_before = runtime.session().mask().expect("mask").clone();

        peer.disconnect();
        runtime.tick().await;
        assert_eq!(runtime.streamer().state(), StreamState::Closed);
        assert!(!runtime.handle_inbound(InboundMessage::Binary(alpha_region_png())).await);

        runtime.shutdown().await.expect("shutdown");
        assert!(!runtime.handle_inbound(InboundMessage::Binary(alpha_region_png())).await);

        assert_eq!(runtime.session().image().expect("image"), &image_before);
        assert_eq!(runtime.session().mask().expect("mask"), &mask_before);
        assert_eq!(runtime.streamer().metrics().inbound_accepted, 0);
        assert_eq!(runtime.session().telemetry().base_images_loaded, 1);
    }
}
