//! Minimal WebSocket-style framing used by the BioImage Suite file client.
//!
//! Only single, unfragmented frames are understood. Client frames must be
//! masked; server frames are never masked. Ping/pong and extensions are not
//! part of the wire contract.

use crate::constants::MAX_FRAME_SIZE;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame header is truncated")]
    Truncated,

    #[error("client frame is not masked")]
    Unmasked,

    #[error("frame payload too large: {0} bytes")]
    TooLarge(u64),

    #[error("frame payload of {length} bytes exceeds the {limit} byte limit for this socket")]
    ExceedsLimit { length: usize, limit: usize },

    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    #[error("handshake request exceeds {0} bytes")]
    HandshakeTooLarge(usize),

    #[error("failed to encode packet: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Text,
    Binary,
    Close,
    Other(u8),
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Opcode {
        match byte & 0x0F {
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            other => Opcode::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Other(code) => code & 0x0F,
        }
    }
}

/// Parsed frame header. `datastart` is the offset of the first payload byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub opcode: Opcode,
    pub mask: Option<[u8; 4]>,
    pub payload_length: usize,
    pub datastart: usize,
}

/// A complete frame read off a socket: its header and the decoded payload.
#[derive(Debug)]
pub struct Frame {
    pub header: WireFrame,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn opcode(&self) -> Opcode {
        self.header.opcode
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Envelope of every server text frame.
#[derive(Debug, Serialize)]
pub struct Packet<'a> {
    #[serde(rename = "type")]
    pub packet_type: &'a str,
    pub payload: Value,
    pub id: Option<u64>,
}

/// Number of header bytes implied by the first two bytes of a frame.
pub fn header_length(first_two: [u8; 2]) -> usize {
    let masked = first_two[1] & 0x80 != 0;
    let extended = match first_two[1] & 0x7F {
        126 => 2,
        127 => 8,
        _ => 0,
    };
    2 + extended + if masked { 4 } else { 0 }
}

/// Reads a frame header from the start of `buffer`.
pub fn parse_control_frame(buffer: &[u8]) -> Result<WireFrame, FramingError> {
    if buffer.len() < 2 {
        return Err(FramingError::Truncated);
    }
    let opcode = Opcode::from_u8(buffer[0]);
    let masked = buffer[1] & 0x80 != 0;
    let mut datastart = 2;
    let payload_length = match buffer[1] & 0x7F {
        126 => {
            if buffer.len() < 4 {
                return Err(FramingError::Truncated);
            }
            datastart = 4;
            u16::from_be_bytes([buffer[2], buffer[3]]) as u64
        }
        127 => {
            if buffer.len() < 10 {
                return Err(FramingError::Truncated);
            }
            datastart = 10;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buffer[2..10]);
            u64::from_be_bytes(raw)
        }
        short => short as u64,
    };
    if payload_length > MAX_FRAME_SIZE as u64 {
        return Err(FramingError::TooLarge(payload_length));
    }

    let mask = if masked {
        if buffer.len() < datastart + 4 {
            return Err(FramingError::Truncated);
        }
        let mut key = [0u8; 4];
        key.copy_from_slice(&buffer[datastart..datastart + 4]);
        datastart += 4;
        Some(key)
    } else {
        None
    };

    Ok(WireFrame {
        opcode,
        mask,
        payload_length: payload_length as usize,
        datastart,
    })
}

/// Unmasks the payload described by `control`: `decoded[i] = buffer[i + datastart] ^ mask[i % 4]`.
pub fn decode(buffer: &[u8], control: &WireFrame) -> Result<Vec<u8>, FramingError> {
    let mask = control.mask.ok_or(FramingError::Unmasked)?;
    let end = control.datastart + control.payload_length;
    if buffer.len() < end {
        return Err(FramingError::Truncated);
    }
    Ok(buffer[control.datastart..end]
        .iter()
        .enumerate()
        .map(|(i, byte)| byte ^ mask[i % 4])
        .collect())
}

/// Builds an unmasked, final frame.
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(len + 10);
    frame.push(0x80 | opcode.as_u8());
    if len < 126 {
        frame.push(len as u8);
    } else if len <= u16::MAX as usize {
        frame.push(126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }
    frame.extend_from_slice(payload);
    frame
}

/// Wraps `payload` in a typed JSON packet inside a text frame.
pub fn format_packet(
    packet_type: &str,
    payload: Value,
    id: Option<u64>,
) -> Result<Vec<u8>, FramingError> {
    let packet = Packet {
        packet_type,
        payload,
        id,
    };
    let text = serde_json::to_vec(&packet)?;
    Ok(encode_frame(Opcode::Text, &text))
}

pub fn format_binary(payload: &[u8]) -> Vec<u8> {
    encode_frame(Opcode::Binary, payload)
}

pub fn format_close() -> Vec<u8> {
    encode_frame(Opcode::Close, &[])
}

/// Reads exactly one frame whose payload is at most `limit` bytes.
/// `Ok(None)` means the peer closed the socket cleanly between frames.
///
/// An unmasked frame is consumed in full before `FramingError::Unmasked` is
/// returned, so the caller can drop it and keep reading. A frame over `limit`
/// is refused right after its header; its payload is still unread and can be
/// skipped with `discard_payload`.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> Result<Option<Frame>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut first_two = [0u8; 2];
    match reader.read_exact(&mut first_two).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut buffer = vec![0u8; header_length(first_two)];
    buffer[..2].copy_from_slice(&first_two);
    reader.read_exact(&mut buffer[2..]).await?;
    let header = parse_control_frame(&buffer)?;
    if header.payload_length > limit {
        return Err(FramingError::ExceedsLimit {
            length: header.payload_length,
            limit,
        });
    }

    // The buffer only grows with bytes that actually arrive.
    (&mut *reader)
        .take(header.payload_length as u64)
        .read_to_end(&mut buffer)
        .await?;
    if buffer.len() < header.datastart + header.payload_length {
        return Err(FramingError::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed inside a frame",
        )));
    }

    if header.mask.is_none() {
        return Err(FramingError::Unmasked);
    }
    let payload = decode(&buffer, &header)?;
    Ok(Some(Frame { header, payload }))
}

/// Skips the unread payload of a frame refused with `ExceedsLimit`.
pub async fn discard_payload<R>(reader: &mut R, length: usize) -> Result<(), FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut payload = (&mut *reader).take(length as u64);
    let skipped = tokio::io::copy(&mut payload, &mut tokio::io::sink()).await?;
    if skipped < length as u64 {
        return Err(FramingError::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed inside a frame",
        )));
    }
    Ok(())
}
