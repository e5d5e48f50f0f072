use serde::{Deserialize, Serialize};

/// Lifecycle of the frame streamer.
///
/// `Idle -> Connecting -> Streaming -> Closed`, or
/// `Streaming -> Errored -> Closed` when the transport fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Errored,
    Closed,
}

/// Status of the persistent channel to the remote processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionStatus {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Closed | ConnectionStatus::Errored)
    }
}

/// Message received from the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Binary(Vec<u8>),
    Text(String),
}

impl InboundMessage {
    pub fn len(&self) -> usize {
        match self {
            InboundMessage::Binary(bytes) => bytes.len(),
            InboundMessage::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
