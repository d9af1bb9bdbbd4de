use crate::constants::{MAX_HANDSHAKE_BYTES, WEBSOCKET_GUID};
use crate::core_network::framing::FramingError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::{debug, warn};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Computes `Sec-WebSocket-Accept` for a client key.
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Splits raw request lines on the first colon. Header names are lowercased;
/// the request line and malformed lines are ignored.
pub fn parse_headers(request: &str) -> HashMap<String, String> {
    request
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

pub fn upgrade_response(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        accept
    )
}

/// Reads the HTTP upgrade request up to the blank line and answers it.
///
/// Runs once per socket; afterwards the same reader carries frames.
pub async fn perform_handshake<R, W>(reader: &mut R, writer: &mut W) -> Result<(), FramingError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut request = String::new();
    loop {
        let before = request.len();
        // One byte past the cap is enough to tell an oversized request apart.
        let allowance = (MAX_HANDSHAKE_BYTES + 1 - before) as u64;
        let n = (&mut *reader).take(allowance).read_line(&mut request).await?;
        if n == 0 {
            return Err(FramingError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed during handshake",
            )));
        }
        if request.len() > MAX_HANDSHAKE_BYTES {
            return Err(FramingError::HandshakeTooLarge(MAX_HANDSHAKE_BYTES));
        }
        if request[before..].trim().is_empty() {
            break;
        }
    }

    let headers = parse_headers(&request);
    let key = match headers.get("sec-websocket-key") {
        Some(key) if !key.is_empty() => key,
        _ => {
            warn!("Handshake without Sec-WebSocket-Key rejected");
            return Err(FramingError::MissingKey);
        }
    };

    let accept = compute_accept_key(key);
    writer.write_all(upgrade_response(&accept).as_bytes()).await?;
    writer.flush().await?;
    debug!("Handshake complete, accept key {}", accept);
    Ok(())
}
