use crate::core_sandbox::FileServerError;
use crate::core_upload::compute_checksum;
use crate::helpers::{send_binary, send_packet, SharedWriter};
use crate::server::ServerContext;
use log::info;
use serde_json::json;
use tokio::fs;

/// Handles the `readfile` command.
///
/// Text files are sent as a `text` packet. Binary files are sent as a
/// `checksum` packet followed by one binary frame with the raw bytes.
pub async fn handle_readfile_command(
    writer: &SharedWriter,
    ctx: &ServerContext,
    filename: &str,
    isbinary: bool,
    id: Option<u64>,
) -> Result<(), FileServerError> {
    let path = ctx.sandbox.resolve(filename)?;

    if isbinary {
        let data = fs::read(&path)
            .await
            .map_err(|e| FileServerError::io(&path, e))?;
        let checksum = compute_checksum(&data);
        info!("Sending {:?} ({} bytes, sha256 {})", path, data.len(), checksum);
        send_packet(writer, "checksum", json!(checksum), id).await?;
        send_binary(writer, &data).await?;
    } else {
        let text = fs::read_to_string(&path)
            .await
            .map_err(|e| FileServerError::io(&path, e))?;
        info!("Sending {:?} as text ({} bytes)", path, text.len());
        send_packet(writer, "text", json!(text), id).await?;
    }
    Ok(())
}
