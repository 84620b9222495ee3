//! HTTP/1.1 upgrade handshake.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{Result, WsError};

/// Upper bound on the response header block.
const MAX_RESPONSE_HEADER: usize = 16 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Random `Sec-WebSocket-Key`: 16 random bytes, base64 encoded.
pub(crate) fn generate_key() -> String {
    let nonce: [u8; 16] = rand::random();
    BASE64.encode(nonce)
}

pub(crate) fn build_request(endpoint: &Endpoint, key: &str) -> String {
    format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        endpoint.resource,
        endpoint.authority(),
        key
    )
}

/// Check that the status line announces `101 Switching Protocols`.
pub(crate) fn check_status_line(line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();

    if !version.starts_with("HTTP/") {
        return Err(WsError::handshake(format!("malformed status line '{}'", line)));
    }
    if code != "101" {
        return Err(WsError::handshake(format!("server answered '{}'", line)));
    }
    Ok(())
}

/// Run the client side of the handshake on `stream`.
///
/// Returns any bytes the server sent after the header block; they belong
/// to the first frame.
pub(crate) async fn client_handshake<S>(stream: &mut S, endpoint: &Endpoint) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let key = generate_key();
    let request = build_request(endpoint, &key);

    trace!(resource = %endpoint.resource, "Sending upgrade request");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut response = Vec::with_capacity(512);
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = find_terminator(&response) {
            break pos;
        }
        if response.len() > MAX_RESPONSE_HEADER {
            return Err(WsError::handshake("response header too large"));
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(WsError::handshake("connection closed during handshake"));
        }
        response.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&response[..header_end]);
    let status_line = head.lines().next().unwrap_or_default();
    check_status_line(status_line)?;

    debug!(status = %status_line, "WebSocket upgrade accepted");

    Ok(response[header_end + HEADER_TERMINATOR.len()..].to_vec())
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}
