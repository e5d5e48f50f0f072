//! Persistent frame channel to the remote processor and the upload endpoint.

mod local;
mod upload;
mod websocket;

pub use local::{LocalTransport, RemotePeer};
pub use upload::{HttpUploadClient, UploadEndpoint};
pub use websocket::WebSocketTransport;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use roimask_types::{
    stream::{ConnectionStatus, InboundMessage},
    Result, RoiError,
};

/// Why a frame could not be handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    /// Channel is still connecting.
    NotOpen,
    /// Outbound queue is at capacity.
    Full,
    /// Channel was closed or failed.
    Disconnected,
}

/// Ordered, bidirectional message channel, one message per frame.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<()>;
    fn status(&self) -> ConnectionStatus;
    /// Queues a payload without waiting.
    fn try_send(&self, payload: Vec<u8>) -> std::result::Result<(), SendRejected>;
    fn inbound(&self) -> BoxStream<'static, InboundMessage>;
    async fn close(&self) -> Result<()>;
}

/// Connection status shared between a transport and its background tasks.
#[derive(Debug, Clone)]
pub(crate) struct StatusCell(Arc<Mutex<ConnectionStatus>>);

impl StatusCell {
    pub(crate) fn new(status: ConnectionStatus) -> Self {
        Self(Arc::new(Mutex::new(status)))
    }

    pub(crate) fn get(&self) -> ConnectionStatus {
        self.0
            .lock()
            .map(|guard| *guard)
            .unwrap_or(ConnectionStatus::Errored)
    }

    pub(crate) fn set(&self, status: ConnectionStatus) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = status;
        }
    }

    /// Moves to `Closed` unless the channel already failed.
    pub(crate) fn close(&self) {
        if let Ok(mut guard) = self.0.lock() {
            if *guard != ConnectionStatus::Errored {
                *guard = ConnectionStatus::Closed;
            }
        }
    }
}

/// `None` when a channel in `status` can take a payload.
pub(crate) fn rejection_for(status: ConnectionStatus) -> Option<SendRejected> {
    match status {
        ConnectionStatus::Open => None,
        ConnectionStatus::Connecting => Some(SendRejected::NotOpen),
        ConnectionStatus::Closed | ConnectionStatus::Errored => Some(SendRejected::Disconnected),
    }
}

pub fn transport_error(message: impl Into<String>) -> RoiError {
    RoiError::Transport(message.into())
}

pub fn upload_error(message: impl Into<String>) -> RoiError {
    RoiError::Upload(message.into())
}
