use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{stream::StreamState, telemetry::StreamMetrics};

/// High-level event kinds moving through the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Stream,
    Mask,
    Export,
}

/// Immutable event envelope for logging and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    Stream(StreamEvent),
    Mask(MaskEvent),
    Export(ExportEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    Boot,
    SourceAttached,
    BaseImageLoaded,
    StreamStarted,
    StreamClosed,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub state: StreamState,
    pub metrics: StreamMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskEvent {
    pub set_cells: usize,
    pub filled_cells: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEvent {
    pub image_bytes: usize,
    pub mask_width: u32,
    pub mask_height: u32,
}

impl SystemEvent {
    pub fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn lifecycle(phase: LifecyclePhase, details: impl Into<Option<String>>) -> Self {
        Self::new(
            EventKind::Lifecycle,
            EventPayload::Lifecycle(LifecycleEvent {
                phase,
                details: details.into(),
            }),
        )
    }
}
