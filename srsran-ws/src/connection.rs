//! Client-side WebSocket connection over an arbitrary byte stream.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{Result, WsError};
use crate::frame::{
    Frame, FrameHead, MAX_CONTROL_PAYLOAD, OpCode, apply_mask, close_code, close_payload,
    encode_client_frame,
};
use crate::handshake::client_handshake;

/// Default cap on a single frame or reassembled message.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A complete application-level message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// Close frame with its status code, if the peer sent one.
    Close(Option<u16>),
}

/// Partially received fragmented message.
#[derive(Debug)]
struct Fragments {
    opcode: OpCode,
    data: Vec<u8>,
}

/// An upgraded WebSocket client connection.
pub struct WebSocket<S> {
    stream: S,
    /// Bytes read past the handshake header that have not been consumed yet.
    pending: Vec<u8>,
    max_payload: usize,
    fragments: Option<Fragments>,
}

impl WebSocket<TcpStream> {
    /// Open a TCP connection to `url` and perform the upgrade handshake.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Endpoint::parse(url)?;
        let stream = connect_tcp(&endpoint, timeout).await?;
        Self::handshake(stream, &endpoint).await
    }
}

/// Open the raw TCP stream for `endpoint`, bounded by `timeout`.
pub async fn connect_tcp(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream> {
    let addr = endpoint.authority();

    let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
    let stream = match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(WsError::Connect { addr, source }),
        Err(_) => {
            return Err(WsError::Connect {
                addr,
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
            });
        }
    };

    // Frames are small and latency matters more than batching.
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl<S> WebSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform the client handshake on an already connected stream.
    pub async fn handshake(mut stream: S, endpoint: &Endpoint) -> Result<Self> {
        let pending = client_handshake(&mut stream, endpoint).await?;
        Ok(Self {
            stream,
            pending,
            max_payload: DEFAULT_MAX_PAYLOAD,
            fragments: None,
        })
    }

    /// Limit the size of a single frame or reassembled message.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Send a complete text message as one masked final frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send_frame(OpCode::Text, text.as_bytes()).await
    }

    /// Answer a ping by echoing its payload.
    pub async fn send_pong(&mut self, payload: &[u8]) -> Result<()> {
        let len = payload.len().min(MAX_CONTROL_PAYLOAD);
        self.send_frame(OpCode::Pong, &payload[..len]).await
    }

    /// Send a close frame.
    pub async fn send_close(&mut self, code: Option<u16>) -> Result<()> {
        self.send_frame(OpCode::Close, &close_payload(code)).await
    }

    async fn send_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let mask: [u8; 4] = rand::random();
        let frame = encode_client_frame(opcode, payload, mask);

        trace!(?opcode, len = payload.len(), "Sending frame");
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read exactly one frame.
    pub async fn recv_frame(&mut self) -> Result<Frame> {
        let mut head = [0u8; 2];
        self.read_exact(&mut head).await?;
        let head = FrameHead::parse(head)?;

        let len = match head.extended_len_bytes() {
            2 => {
                let mut ext = [0u8; 2];
                self.read_exact(&mut ext).await?;
                u64::from(u16::from_be_bytes(ext))
            }
            8 => {
                let mut ext = [0u8; 8];
                self.read_exact(&mut ext).await?;
                u64::from_be_bytes(ext)
            }
            _ => u64::from(head.len7),
        };

        if head.opcode.is_control() {
            if !head.fin {
                return Err(WsError::protocol("fragmented control frame"));
            }
            if len > MAX_CONTROL_PAYLOAD as u64 {
                return Err(WsError::protocol(format!(
                    "control frame payload of {} bytes",
                    len
                )));
            }
        }

        if len > self.max_payload as u64 {
            return Err(WsError::protocol(format!(
                "frame payload of {} bytes exceeds limit of {}",
                len, self.max_payload
            )));
        }

        // Servers must not mask, but unmask anyway if one does.
        let mask = if head.masked {
            let mut mask = [0u8; 4];
            self.read_exact(&mut mask).await?;
            Some(mask)
        } else {
            None
        };

        let mut payload = vec![0u8; len as usize];
        self.read_exact(&mut payload).await?;
        if let Some(mask) = mask {
            apply_mask(&mut payload, mask);
        }

        trace!(opcode = ?head.opcode, fin = head.fin, len, "Received frame");

        Ok(Frame {
            fin: head.fin,
            opcode: head.opcode,
            payload,
        })
    }

    /// Read the next complete message, reassembling fragments.
    ///
    /// Control frames interleaved between fragments are returned as they
    /// arrive; the partial message is kept until its final fragment.
    pub async fn recv_message(&mut self) -> Result<Message> {
        loop {
            let frame = self.recv_frame().await?;

            match frame.opcode {
                OpCode::Ping => return Ok(Message::Ping(frame.payload)),
                OpCode::Pong => return Ok(Message::Pong(frame.payload)),
                OpCode::Close => return Ok(Message::Close(close_code(&frame.payload))),
                OpCode::Text | OpCode::Binary => {
                    if self.fragments.is_some() {
                        return Err(WsError::protocol(
                            "new data frame while a fragmented message is in progress",
                        ));
                    }
                    if frame.fin {
                        return Ok(into_message(frame.opcode, frame.payload));
                    }
                    debug!(opcode = ?frame.opcode, "Start of fragmented message");
                    self.fragments = Some(Fragments {
                        opcode: frame.opcode,
                        data: frame.payload,
                    });
                }
                OpCode::Continuation => {
                    let Some(fragments) = self.fragments.as_mut() else {
                        return Err(WsError::protocol("continuation frame without a message"));
                    };

                    if fragments.data.len() + frame.payload.len() > self.max_payload {
                        self.fragments = None;
                        return Err(WsError::protocol(format!(
                            "fragmented message exceeds limit of {} bytes",
                            self.max_payload
                        )));
                    }
                    fragments.data.extend_from_slice(&frame.payload);

                    if frame.fin
                        && let Some(done) = self.fragments.take()
                    {
                        return Ok(into_message(done.opcode, done.data));
                    }
                }
            }
        }
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let from_pending = buf.len().min(self.pending.len());
        if from_pending > 0 {
            buf[..from_pending].copy_from_slice(&self.pending[..from_pending]);
            self.pending.drain(..from_pending);
        }

        if from_pending < buf.len() {
            self.stream
                .read_exact(&mut buf[from_pending..])
                .await
                .map_err(WsError::from_read)?;
        }
        Ok(())
    }
}

fn into_message(opcode: OpCode, data: Vec<u8>) -> Message {
    match opcode {
        OpCode::Text => Message::Text(match String::from_utf8(data) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }),
        _ => Message::Binary(data),
    }
}
