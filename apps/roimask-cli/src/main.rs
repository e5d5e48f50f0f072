use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use roimask_capture::{StillImage, SyntheticCamera};
use roimask_network::{FrameTransport, HttpUploadClient, LocalTransport, WebSocketTransport};
use roimask_ops::TelemetryStore;
use roimask_session::{EditorCommand, EditorRuntime};
use roimask_stream::SystemClock;
use roimask_types::config::RoiConfig;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "roimask", about = "Region-of-interest mask editor and frame streamer")]
struct Cli {
    /// Config file; falls back to ROIMASK_CONFIG, then configs/dev.toml.
    config: Option<PathBuf>,
    /// How long to stream before shutting down.
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,
    /// Stream into an in-process peer instead of the configured endpoint.
    #[arg(long)]
    loopback: bool,
    /// Upload this file before streaming and edit the returned image.
    #[arg(long)]
    upload: Option<PathBuf>,
    /// Brush radius to use; clamped to the configured bounds.
    #[arg(long)]
    brush_radius: Option<u32>,
    /// Submit the image and mask shortly before shutting down.
    #[arg(long)]
    export_on_exit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone());

    if cli.loopback {
        let (transport, mut peer) = LocalTransport::pair(config.stream.outbound_capacity);
        tokio::spawn(async move {
            let mut received = 0usize;
            while let Some(frame) = peer.recv_frame().await {
                received += 1;
                info!("Loopback peer received frame {} ({} bytes)", received, frame.len());
            }
        });
        drive(config, transport, &cli).await
    } else {
        let transport = WebSocketTransport::new(config.stream.outbound_capacity);
        drive(config, transport, &cli).await
    }
}

async fn drive<T: FrameTransport>(config: RoiConfig, transport: T, cli: &Cli) -> Result<()> {
    let camera = SyntheticCamera::new(config.capture.clone());
    let uploader = HttpUploadClient::new(&config.upload)?;
    let telemetry = TelemetryStore::new();
    let telemetry_dir = PathBuf::from(&config.ops.telemetry_dir);

    let mut runtime = EditorRuntime::new(
        config,
        camera,
        transport,
        SystemClock::new(),
        uploader,
        telemetry.clone(),
    );
    runtime.boot().await?;

    if let Some(path) = &cli.upload {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read upload file {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Err(err) = runtime.upload_still(StillImage::new(file_name, bytes)).await {
            warn!("Upload failed: {}", err);
        }
    } else if let Err(err) = runtime.capture_still().await {
        warn!("Still capture failed: {}", err);
    }

    if let Err(err) = runtime.start_stream().await {
        warn!("Streaming unavailable, editing locally: {}", err);
    }

    let (commands, command_rx) = mpsc::channel(64);
    if let Some(radius) = cli.brush_radius {
        commands.send(EditorCommand::SetBrushRadius(radius)).await?;
    }
    if cli.export_on_exit {
        let commands = commands.clone();
        let duration =
            Duration::from_secs(cli.duration_secs).saturating_sub(Duration::from_millis(500));
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = commands.send(EditorCommand::Export).await;
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let duration = Duration::from_secs(cli.duration_secs);
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        let _ = shutdown_tx.send(true);
    });

    runtime.run_until(command_rx, shutdown_rx).await?;
    drop(commands);
    let metrics = runtime.streamer().metrics();
    info!(
        "Sent {} frames ({} bytes), throttled {}, dropped {}",
        metrics.frames_sent, metrics.bytes_sent, metrics.frames_throttled, metrics.frames_dropped
    );
    if let Some(status) = runtime.status() {
        warn!("Last status: {}", status);
    }
    telemetry.persist_events(&telemetry_dir).await?;
    Ok(())
}

fn load_config(from_args: Option<PathBuf>) -> RoiConfig {
    let from_env = env::var("ROIMASK_CONFIG").ok().map(PathBuf::from);
    let path = from_args
        .or(from_env)
        .unwrap_or_else(|| PathBuf::from("configs/dev.toml"));
    match RoiConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                RoiConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            RoiConfig::default()
        }
    }
}
