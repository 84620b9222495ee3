//! Error types for the WebSocket transport.

use thiserror::Error;

/// Result type alias using [`WsError`].
pub type Result<T> = std::result::Result<T, WsError>;

/// Errors raised while connecting to or talking with a WebSocket server.
#[derive(Debug, Error)]
pub enum WsError {
    /// The URL could not be used to reach a WebSocket server.
    #[error("Invalid WebSocket URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The TCP connection could not be established.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The upgrade handshake was rejected or cut short.
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    /// The peer closed the stream in the middle of a read.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The peer sent something that violates RFC 6455 framing.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WsError {
    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a handshake error.
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Map a read failure, folding EOF into [`WsError::ConnectionClosed`].
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            _ => Self::Io(err),
        }
    }
}
