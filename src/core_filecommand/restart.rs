use crate::helpers::{send_packet, SharedWriter};
use log::info;
use serde_json::json;

/// Handles the `restart` command. The control connection is closed after
/// the reply; the listener keeps running, so the client simply reconnects.
pub async fn handle_restart_command(
    writer: &SharedWriter,
    id: Option<u64>,
) -> Result<(), std::io::Error> {
    info!("Restart requested, asking client to reconnect");
    send_packet(writer, "tryagain", json!(""), id).await
}
