//! Operational helpers: logging, event recording, telemetry persistence.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use roimask_types::{
    config::OpsConfig, events::SystemEvent, telemetry::SessionTelemetry, Result, RoiError,
};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| RoiError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| RoiError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// In-memory store of everything the runtime published.
#[derive(Clone, Default)]
pub struct TelemetryStore {
    events: Arc<Mutex<Vec<SystemEvent>>>,
    sessions: Arc<Mutex<Vec<SessionTelemetry>>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_event(&self, event: SystemEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }

    pub async fn record_session(&self, telemetry: SessionTelemetry) -> Result<()> {
        self.sessions.lock().await.push(telemetry);
        Ok(())
    }

    pub async fn snapshot_events(&self) -> Vec<SystemEvent> {
        self.events.lock().await.clone()
    }

    pub async fn snapshot_sessions(&self) -> Vec<SessionTelemetry> {
        self.sessions.lock().await.clone()
    }

    /// Writes recorded events as JSON lines into `dir` and returns the file.
    pub async fn persist_events(&self, dir: &Path) -> Result<PathBuf> {
        let events = self.snapshot_events().await;
        let path = dir.join(format!("events_{}.jsonl", Utc::now().format("%Y%m%d_%H%M%S_%3f")));
        let mut file = std::fs::File::create(&path)
            .map_err(|err| RoiError::Ops(format!("failed to create {}: {err}", path.display())))?;
        for event in &events {
            let line = serde_json::to_string(event)
                .map_err(|err| RoiError::Ops(format!("failed to serialise event: {err}")))?;
            writeln!(file, "{line}")
                .map_err(|err| RoiError::Ops(format!("failed to write {}: {err}", path.display())))?;
        }
        info!("Persisted {} events to {:?}", events.len(), path);
        Ok(path)
    }
}

pub fn ensure_telemetry_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    std::fs::create_dir_all(&dir)
        .map_err(|err| RoiError::Ops(format!("failed to create telemetry dir: {err}")))?;
    info!("Telemetry directory ready at {:?}", dir);
    Ok(dir)
}
