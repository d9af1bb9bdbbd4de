//! Ephemeral data sockets for `uploadfile`.
//!
//! Each upload gets its own listener, one accepted connection and its own
//! `FileInProgress`. The client paces itself on `nextpacket` replies.

use crate::constants::{
    MAX_CONTROL_FRAME_SIZE, MAX_FRAME_SIZE, TRANSFER_ACCEPT_TIMEOUT_SECS, UPLOAD_IDLE_TIMEOUT_MS,
};
use crate::core_network::framing::{discard_payload, read_frame, FramingError, Opcode};
use crate::core_network::handshake::perform_handshake;
use crate::core_network::idle::IdleTimeoutReader;
use crate::core_network::network::bind_with_retry;
use crate::core_sandbox::FileServerError;
use crate::core_upload::{ChunkOutcome, CompletedUpload, FileInProgress, UploadError};
use crate::helpers::{close_socket, send_error, send_packet, SharedWriter};
use crate::server::ServerContext;
use crate::session::Session;
use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use serde_json::json;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// How long a transfer listener waits for its client, and how long an
/// accepted transfer socket may stay silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTimeouts {
    pub accept: Duration,
    pub idle: Duration,
}

impl Default for TransferTimeouts {
    fn default() -> Self {
        Self {
            accept: Duration::from_secs(TRANSFER_ACCEPT_TIMEOUT_SECS),
            idle: Duration::from_millis(UPLOAD_IDLE_TIMEOUT_MS),
        }
    }
}

/// Binds a transfer listener on the first free port above the control port.
pub async fn open_transfer_listener(ctx: &ServerContext) -> std::io::Result<(TcpListener, u16)> {
    bind_with_retry(ctx.host, ctx.port.saturating_add(1)).await
}

/// Waits for the client on `listener` and receives one upload.
///
/// `id` is the id of the `uploadfile` command and is echoed on every reply.
pub async fn run_transfer(
    listener: TcpListener,
    port: u16,
    upload: FileInProgress,
    ctx: Arc<ServerContext>,
    id: Option<u64>,
) {
    let timeouts = ctx.transfer_timeouts;
    let accepted = timeout(timeouts.accept, listener.accept()).await;
    // One connection per transfer listener.
    drop(listener);

    let (socket, addr) = match accepted {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            error!("Failed to accept transfer connection on port {}: {}", port, e);
            return;
        }
        Err(_) => {
            warn!(
                "No client connected to transfer port {} within {} s",
                port, TRANSFER_ACCEPT_TIMEOUT_SECS
            );
            return;
        }
    };
    info!("Transfer connection from {} on port {}", addr, port);

    if let Err(e) = handle_transfer_connection(socket, addr, port, upload, &ctx, id).await {
        warn!("Transfer on port {} failed: {:#}", port, e);
    }
    info!("Transfer server on port {} closed", port);
}

async fn handle_transfer_connection(
    socket: TcpStream,
    addr: SocketAddr,
    port: u16,
    upload: FileInProgress,
    ctx: &ServerContext,
    id: Option<u64>,
) -> Result<()> {
    socket.set_nodelay(true).ok();
    let mut session = Session::new(addr, port, true);
    let (read_half, write_half) = socket.into_split();
    let read_half = IdleTimeoutReader::new(read_half, ctx.transfer_timeouts.idle);
    let mut reader = BufReader::new(read_half);
    let writer: SharedWriter = Arc::new(Mutex::new(write_half));

    {
        let mut write_half = writer.lock().await;
        perform_handshake(&mut reader, &mut *write_half)
            .await
            .context("transfer handshake failed")?;
    }
    session.complete_handshake();

    let mut upload = Some(upload);

    while session.is_dispatching() {
        // Chunks never exceed the declared packet size.
        let limit = upload
            .as_ref()
            .map_or(MAX_CONTROL_FRAME_SIZE, |u| u.packet_size().min(MAX_FRAME_SIZE));
        reader.get_mut().rearm();

        let frame = match read_frame(&mut reader, limit).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(FramingError::Io(e)) if e.kind() == ErrorKind::TimedOut => {
                warn!(
                    "Transfer port {} idle for {} ms, closing",
                    port,
                    reader.get_ref().idle().as_millis()
                );
                break;
            }
            Err(FramingError::Unmasked) => {
                warn!("Dropping unmasked frame on transfer port {}", port);
                continue;
            }
            Err(FramingError::ExceedsLimit { length, limit }) => {
                warn!(
                    "Dropping {} byte chunk on transfer port {}, packet size is {}",
                    length, port, limit
                );
                discard_payload(&mut reader, length)
                    .await
                    .context("failed to skip oversized chunk")?;
                continue;
            }
            Err(e) => return Err(e).context("failed to read transfer frame"),
        };

        match frame.opcode() {
            Opcode::Close => {
                debug!("Client closed transfer port {}", port);
                break;
            }
            Opcode::Binary => {}
            other => {
                debug!("Ignoring {:?} frame on transfer port {}", other, port);
                continue;
            }
        }

        let Some(current) = upload.as_mut() else {
            warn!("{} (port {})", UploadError::NotInProgress, port);
            continue;
        };

        match current.accept_chunk(&frame.payload) {
            Ok(ChunkOutcome::NeedMore { offset }) => {
                trace!("Received {} bytes, offset now {}", frame.payload.len(), offset);
                send_packet(&writer, "nextpacket", json!({ "offset": offset }), id).await?;
            }
            Ok(ChunkOutcome::Complete(done)) => {
                upload = None;
                save_upload(&writer, ctx, done, id).await?;
            }
            Err(UploadError::ChecksumMismatch { computed }) => {
                upload = None;
                warn!("Upload on port {} discarded, checksum {} does not match", port, computed);
                send_packet(&writer, "uploadfailed", json!({ "checksum": computed }), id).await?;
            }
            Err(e) => warn!("Dropping chunk on transfer port {}: {}", port, e),
        }
    }

    session.terminate();
    close_socket(&writer).await;
    Ok(())
}

/// Persists a verified upload and tells the client how it went.
async fn save_upload(
    writer: &SharedWriter,
    ctx: &ServerContext,
    done: CompletedUpload,
    id: Option<u64>,
) -> std::io::Result<()> {
    if !done.is_binary && std::str::from_utf8(&done.data).is_err() {
        let err = FileServerError::BadRequest(format!(
            "{} was uploaded as text but is not valid UTF-8",
            done.name.display()
        ));
        return send_error(writer, &err, id).await;
    }

    match ctx.store.write_file(&done.name, &done.data).await {
        Ok(()) => {
            info!("Upload of {:?} complete ({} bytes)", done.name, done.data.len());
            send_packet(
                writer,
                "uploadcomplete",
                json!({ "name": done.name.to_string_lossy(), "checksum": done.checksum }),
                id,
            )
            .await
        }
        Err(e) => {
            error!("Failed to save upload {:?}: {}", done.name, e);
            send_error(writer, &e, id).await
        }
    }
}
