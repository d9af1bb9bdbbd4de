use crate::core_network::transfer::{open_transfer_listener, run_transfer};
use crate::core_sandbox::FileServerError;
use crate::core_upload::{FileInProgress, UploadRequest};
use crate::helpers::{send_packet, SharedWriter};
use crate::server::ServerContext;
use log::info;
use serde_json::json;
use std::sync::Arc;

/// Handles the `uploadfile` command.
///
/// Checks the destination, opens a transfer listener above the control port
/// and hands the upload to its own task. The client is told the port through
/// an `uploadmessage` packet named `datasocketready`.
pub async fn handle_uploadfile_command(
    writer: &SharedWriter,
    ctx: &Arc<ServerContext>,
    request: UploadRequest,
    id: Option<u64>,
) -> Result<(), FileServerError> {
    let destination = ctx.store.check_upload(&request.filename)?;
    let upload = FileInProgress::new(&request, destination.clone())
        .map_err(|e| FileServerError::BadRequest(e.to_string()))?;

    let (listener, port) = open_transfer_listener(ctx)
        .await
        .map_err(FileServerError::TransferSocket)?;
    info!(
        "Upload #{} of {:?}: {} bytes in packets of {}, transfer port {}",
        request.upload_count.unwrap_or_default(),
        destination,
        request.total_size,
        request.packet_size,
        port
    );

    tokio::spawn(run_transfer(listener, port, upload, Arc::clone(ctx), id));

    send_packet(
        writer,
        "uploadmessage",
        json!({ "name": "datasocketready", "port": port, "id": id }),
        id,
    )
    .await?;
    Ok(())
}
