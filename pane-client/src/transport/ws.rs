//! WebSocket relay transport over tokio-tungstenite.
//!
//! The socket is split on connect: the write half serves `send()`/`close()`
//! and the read half serves `recv()`, so a pending receive never blocks an
//! outbound frame.

use super::{RelayTransport, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay transport speaking JSON text frames over a WebSocket.
#[derive(Default)]
pub struct WsRelayTransport {
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
    open: AtomicBool,
}

impl WsRelayTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for WsRelayTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsRelayTransport")
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl RelayTransport for WsRelayTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (tx, rx) = ws.split();

        *self.sink.lock().await = Some(tx);
        *self.stream.lock().await = Some(rx);
        self.open.store(true, Ordering::Release);
        tracing::debug!("Relay WebSocket open: {}", url);
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;

        sink.send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Close(_))) | None => {
                    self.open.store(false, Ordering::Release);
                    return Err(TransportError::ConnectionClosed);
                }
                // Ping/pong are answered by tungstenite; binary frames are not ours
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.open.store(false, Ordering::Release);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::Release);
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        sink.close()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}
