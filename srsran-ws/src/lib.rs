//! Minimal RFC 6455 WebSocket client.
//!
//! Just enough of the protocol to talk to the srsRAN gNB remote control
//! server: the HTTP upgrade handshake, masked client frames, server frame
//! decoding, control frames and fragment reassembly. TLS and extensions
//! (compression) are not supported.
//!
//! - [`endpoint`] - `ws://` URL resolution
//! - [`frame`] - Frame header and masking
//! - [`connection`] - The [`WebSocket`] connection itself
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use srsran_ws::{Message, WebSocket};
//!
//! let mut ws = WebSocket::connect("ws://127.0.0.1:8001", Duration::from_secs(10)).await?;
//! ws.send_text(r#"{"cmd":"metrics_subscribe"}"#).await?;
//! while let Message::Text(text) = ws.recv_message().await? {
//!     println!("{}", text);
//! }
//! ```

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod frame;
mod handshake;

pub use connection::{DEFAULT_MAX_PAYLOAD, Message, WebSocket, connect_tcp};
pub use endpoint::Endpoint;
pub use error::{Result, WsError};
pub use frame::{Frame, OpCode};
