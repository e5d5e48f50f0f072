use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use roimask_types::{
    stream::{ConnectionStatus, InboundMessage},
    Result,
};
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TrySendError},
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{rejection_for, transport_error, FrameTransport, SendRejected, StatusCell};

/// In-process channel; the paired [`RemotePeer`] plays the remote processor.
pub struct LocalTransport {
    status: StatusCell,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: broadcast::Sender<InboundMessage>,
    refuse_connections: bool,
}

/// Far end of a [`LocalTransport`].
pub struct RemotePeer {
    status: StatusCell,
    frames: mpsc::Receiver<Vec<u8>>,
    replies: broadcast::Sender<InboundMessage>,
}

impl LocalTransport {
    pub fn pair(capacity: usize) -> (Self, RemotePeer) {
        let (outbound, frames) = mpsc::channel(capacity.max(1));
        let (inbound, _) = broadcast::channel(capacity.max(1) * 4);
        let status = StatusCell::new(ConnectionStatus::Connecting);
        let transport = Self {
            status: status.clone(),
            outbound,
            inbound: inbound.clone(),
            refuse_connections: false,
        };
        let peer = RemotePeer {
            status,
            frames,
            replies: inbound,
        };
        (transport, peer)
    }

    /// Transport whose `connect` always fails, as when the server is down.
    pub fn refusing(capacity: usize) -> (Self, RemotePeer) {
        let (mut transport, peer) = Self::pair(capacity);
        transport.refuse_connections = true;
        (transport, peer)
    }
}

#[async_trait]
impl FrameTransport for LocalTransport {
    async fn connect(&self, endpoint: &str) -> Result<()> {
        self.status.set(ConnectionStatus::Connecting);
        if self.refuse_connections {
            self.status.set(ConnectionStatus::Errored);
            return Err(transport_error(format!("connection to {endpoint} refused")));
        }
        info!("Local transport connected ({})", endpoint);
        self.status.set(ConnectionStatus::Open);
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    fn try_send(&self, payload: Vec<u8>) -> std::result::Result<(), SendRejected> {
        if let Some(rejected) = rejection_for(self.status.get()) {
            return Err(rejected);
        }
        self.outbound.try_send(payload).map_err(|err| match err {
            TrySendError::Full(_) => SendRejected::Full,
            TrySendError::Closed(_) => SendRejected::Disconnected,
        })
    }

    fn inbound(&self) -> BoxStream<'static, InboundMessage> {
        BroadcastStream::new(self.inbound.subscribe())
            .filter_map(|message| async move { message.ok() })
            .boxed()
    }

    async fn close(&self) -> Result<()> {
        self.status.close();
        info!("Local transport closed");
        Ok(())
    }
}

impl RemotePeer {
    pub async fn recv_frame(&mut self) -> Option<Vec<u8>> {
        self.frames.recv().await
    }

    /// Every frame queued so far, oldest first.
    pub fn drain_frames(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Sends a message back to the editor. Returns the number of listeners.
    pub fn reply(&self, message: InboundMessage) -> usize {
        self.replies.send(message).unwrap_or(0)
    }

    /// Simulates the connection dropping mid-stream.
    pub fn disconnect(&self) {
        self.status.set(ConnectionStatus::Errored);
    }
}
