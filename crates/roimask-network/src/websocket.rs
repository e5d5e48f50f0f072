use std::sync::Mutex;

use async_trait::async_trait;
use futures::{stream::BoxStream, SinkExt, StreamExt};
use roimask_types::{
    stream::{ConnectionStatus, InboundMessage},
    Result,
};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc::{self, error::TrySendError},
    },
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{rejection_for, transport_error, FrameTransport, SendRejected, StatusCell};

/// WebSocket channel: binary messages out, binary or text messages in.
pub struct WebSocketTransport {
    status: StatusCell,
    capacity: usize,
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    inbound: broadcast::Sender<InboundMessage>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    pub fn new(capacity: usize) -> Self {
        let (inbound, _) = broadcast::channel(16);
        Self {
            status: StatusCell::new(ConnectionStatus::Closed),
            capacity: capacity.max(1),
            outbound: Mutex::new(None),
            inbound,
            reader: Mutex::new(None),
        }
    }
}

#[async_trait]
impl FrameTransport for WebSocketTransport {
    async fn connect(&self, endpoint: &str) -> Result<()> {
        self.status.set(ConnectionStatus::Connecting);
        let (socket, _) = connect_async(endpoint).await.map_err(|err| {
            self.status.set(ConnectionStatus::Errored);
            transport_error(format!("failed to connect to {endpoint}: {err}"))
        })?;
        info!("WebSocket connected to {}", endpoint);
        self.status.set(ConnectionStatus::Open);

        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(self.capacity);

        let writer_status = self.status.clone();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Err(err) = sink.send(Message::Binary(payload)).await {
                    warn!("WebSocket send failed: {}", err);
                    writer_status.set(ConnectionStatus::Errored);
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let reader_status = self.status.clone();
        let inbound = self.inbound.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Binary(bytes)) => {
                        let _ = inbound.send(InboundMessage::Binary(bytes));
                    }
                    Ok(Message::Text(text)) => {
                        let _ = inbound.send(InboundMessage::Text(text));
                    }
                    Ok(Message::Close(frame)) => {
                        info!("WebSocket closed by peer: {:?}", frame);
                        reader_status.close();
                        return;
                    }
                    Ok(other) => debug!("Ignoring control message: {:?}", other),
                    Err(err) => {
                        warn!("WebSocket receive failed: {}", err);
                        reader_status.set(ConnectionStatus::Errored);
                        return;
                    }
                }
            }
            reader_status.close();
        });

        if let Ok(mut guard) = self.outbound.lock() {
            *guard = Some(tx);
        }
        if let Ok(mut guard) = self.reader.lock() {
            if let Some(previous) = guard.replace(reader) {
                previous.abort();
            }
        }
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    fn try_send(&self, payload: Vec<u8>) -> std::result::Result<(), SendRejected> {
        if let Some(rejected) = rejection_for(self.status.get()) {
            return Err(rejected);
        }
        let guard = self.outbound.lock().map_err(|_| SendRejected::Disconnected)?;
        let sender = guard.as_ref().ok_or(SendRejected::NotOpen)?;
        sender.try_send(payload).map_err(|err| match err {
            TrySendError::Full(_) => SendRejected::Full,
            TrySendError::Closed(_) => SendRejected::Disconnected,
        })
    }

    fn inbound(&self) -> BoxStream<'static, InboundMessage> {
        let mut rx = self.inbound.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(message) => yield message,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Inbound consumer lagged; {} messages skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        .boxed()
    }

    async fn close(&self) -> Result<()> {
        // Dropping the sender lets the writer flush and send a close frame.
        if let Ok(mut guard) = self.outbound.lock() {
            guard.take();
        }
        if let Ok(mut guard) = self.reader.lock() {
            if let Some(reader) = guard.take() {
                reader.abort();
            }
        }
        self.status.close();
        info!("WebSocket transport closed");
        Ok(())
    }
}
