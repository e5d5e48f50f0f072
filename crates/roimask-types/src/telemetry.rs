use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters maintained by the frame streamer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StreamMetrics {
    pub frames_sent: u64,
    pub frames_throttled: u64,
    /// Frames abandoned because the transport could not take them.
    pub frames_dropped: u64,
    pub inbound_accepted: u64,
    pub inbound_rejected: u64,
    pub bytes_sent: u64,
    pub last_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionTelemetry {
    pub strokes: u64,
    pub suppressed_strokes: u64,
    pub regions_filled: u64,
    pub base_images_loaded: u64,
}
