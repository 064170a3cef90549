//! Transport abstraction for the event stream.
//!
//! A [`StreamConnector`] opens connections; each connection is a
//! [`StreamTransport`] that yields [`StreamMessage`]s until the peer closes.
//! The native build provides a tokio-tungstenite implementation.

use async_trait::async_trait;

use crate::error::TransportError;

/// A WebSocket message, independent of the underlying library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// Text frame (all stream frames are JSON text).
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Ping.
    Ping(Vec<u8>),
    /// Pong.
    Pong(Vec<u8>),
    /// Close frame.
    Close,
}

/// An open stream connection.
#[async_trait]
pub trait StreamTransport: Send {
    /// Receive the next message. `None` means the stream ended.
    async fn recv(&mut self) -> Option<Result<StreamMessage, TransportError>>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens stream connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Connection type produced.
    type Transport: StreamTransport;

    /// Connect to `url`.
    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError>;
}
