//! Tokio-tungstenite WebSocket transport implementation.
//!
//! Wraps `tokio_tungstenite::connect_async()` and implements the `StreamTransport` trait.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::transport::{StreamConnector, StreamMessage, StreamTransport};
use crate::error::TransportError;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A `StreamTransport` backed by tokio-tungstenite.
pub struct TokioTransport {
    ws: WsStream,
}

impl TokioTransport {
    /// Connect to a WebSocket URL and return a `TokioTransport`.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let url = url::Url::parse(url)
            .map_err(|e| TransportError::ConnectionFailed(format!("invalid URL: {}", e)))?;
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self { ws })
    }
}

#[async_trait]
impl StreamTransport for TokioTransport {
    async fn recv(&mut self) -> Option<Result<StreamMessage, TransportError>> {
        match self.ws.next().await {
            Some(Ok(Message::Text(text))) => Some(Ok(StreamMessage::Text(text.to_string()))),
            Some(Ok(Message::Binary(data))) => Some(Ok(StreamMessage::Binary(data.to_vec()))),
            Some(Ok(Message::Ping(data))) => Some(Ok(StreamMessage::Ping(data.to_vec()))),
            Some(Ok(Message::Pong(data))) => Some(Ok(StreamMessage::Pong(data.to_vec()))),
            Some(Ok(Message::Close(_))) => Some(Ok(StreamMessage::Close)),
            // Raw frames are not produced when reading; skip.
            Some(Ok(Message::Frame(_))) => Some(Ok(StreamMessage::Pong(vec![]))),
            Some(Err(e)) => Some(Err(TransportError::Stream(e.to_string()))),
            None => None,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.ws
            .close(None)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}

/// Connector that creates `TokioTransport` connections via `tokio-tungstenite`.
pub struct TokioConnector;

#[async_trait]
impl StreamConnector for TokioConnector {
    type Transport = TokioTransport;

    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError> {
        TokioTransport::connect(url).await
    }
}
