use crate::core_sandbox::FileServerError;
use crate::helpers::{send_packet, SharedWriter};
use crate::server::ServerContext;
use serde_json::json;

pub async fn handle_base_directory_command(
    writer: &SharedWriter,
    ctx: &ServerContext,
    id: Option<u64>,
) -> Result<(), FileServerError> {
    let directories: Vec<String> = ctx
        .sandbox
        .base_directories()
        .iter()
        .map(|dir| dir.to_string_lossy().into_owned())
        .collect();
    send_packet(writer, "serverbasedirectory", json!(directories), id).await?;
    Ok(())
}

pub async fn handle_temp_directory_command(
    writer: &SharedWriter,
    ctx: &ServerContext,
    id: Option<u64>,
) -> Result<(), FileServerError> {
    let temp = ctx.sandbox.temp_directory().to_string_lossy().into_owned();
    send_packet(writer, "servertempdirectory", json!(temp), id).await?;
    Ok(())
}
