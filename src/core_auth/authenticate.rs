use crate::constants::MAX_CONTROL_FRAME_SIZE;
use crate::core_network::framing::{read_frame, FramingError, Opcode};
use crate::helpers::{send_packet, SharedWriter};
use crate::server::ServerContext;
use crate::session::Session;
use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::io::AsyncRead;

/// Pulls the password out of an authentication frame. Clients send either the
/// bare password or `{"password": "..."}`.
pub fn extract_password(text: &str) -> String {
    let text = text.trim();
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map
            .get("password")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => text.to_string(),
    }
}

/// Runs the password exchange on a freshly upgraded control socket.
///
/// Returns `Ok(true)` once the client is authenticated and `Ok(false)` if it
/// went away first. Wrong passwords are answered with `badauth` and the
/// client may try again.
pub async fn authenticate<R>(
    reader: &mut R,
    writer: &SharedWriter,
    ctx: &ServerContext,
    session: &mut Session,
) -> Result<bool, FramingError>
where
    R: AsyncRead + Unpin,
{
    send_packet(writer, "authenticate", json!(""), None).await?;

    loop {
        let frame = match read_frame(reader, MAX_CONTROL_FRAME_SIZE).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(false),
            Err(FramingError::Unmasked) => {
                warn!("Dropping unmasked frame from {}", session.peer);
                continue;
            }
            Err(e) => return Err(e),
        };

        match frame.opcode() {
            Opcode::Close => return Ok(false),
            Opcode::Text | Opcode::Binary => {}
            Opcode::Other(code) => {
                debug!("Ignoring opcode {} while waiting for password", code);
                continue;
            }
        }

        let password = extract_password(&frame.text());
        let accepted = {
            let mut otp = ctx.otp.lock().await;
            let accepted = otp.check(&password, ctx.config.insecure);
            otp.announce(ctx.port);
            accepted
        };

        if accepted {
            session.authenticate();
            info!("Client {} authenticated", session.peer);
            send_packet(writer, "goodauth", json!(""), None).await?;
            return Ok(true);
        }
        warn!("Bad password from {}", session.peer);
        send_packet(writer, "badauth", json!(""), None).await?;
    }
}
