use crate::core_network::framing::{format_binary, format_close, format_packet};
use crate::core_sandbox::FileServerError;
use log::{error, trace};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Write half of a socket, shared between a connection and the tasks it spawns.
pub type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

/// Sends raw bytes to the client.
pub async fn send_response(writer: &SharedWriter, message: &[u8]) -> Result<(), std::io::Error> {
    let mut writer = writer.lock().await;
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

/// Sends a `{type, payload, id}` packet in a text frame.
pub async fn send_packet(
    writer: &SharedWriter,
    packet_type: &str,
    payload: Value,
    id: Option<u64>,
) -> Result<(), std::io::Error> {
    let frame = format_packet(packet_type, payload, id).map_err(|e| {
        error!("Failed to encode {} packet: {}", packet_type, e);
        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
    })?;
    trace!("Sending {} packet ({} bytes)", packet_type, frame.len());
    send_response(writer, &frame).await
}

pub async fn send_binary(writer: &SharedWriter, data: &[u8]) -> Result<(), std::io::Error> {
    send_response(writer, &format_binary(data)).await
}

pub async fn send_error(
    writer: &SharedWriter,
    err: &FileServerError,
    id: Option<u64>,
) -> Result<(), std::io::Error> {
    send_packet(writer, "error", err.to_packet(id), id).await
}

/// Sends a close frame and shuts the write half down.
pub async fn close_socket(writer: &SharedWriter) {
    let mut writer = writer.lock().await;
    let _ = writer.write_all(&format_close()).await;
    let _ = writer.shutdown().await;
}
