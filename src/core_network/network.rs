use crate::constants::{MAX_CONTROL_FRAME_SIZE, MAX_RETRY_PORT};
use crate::core_auth::authenticate::authenticate;
use crate::core_filecommand::handlers::{dispatch, Flow};
use crate::core_network::framing::{read_frame, FramingError, Opcode};
use crate::core_network::handshake::perform_handshake;
use crate::helpers::{close_socket, SharedWriter};
use crate::server::ServerContext;
use crate::session::Session;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Binds `host:port`, moving to the next port while the current one is taken.
///
/// Ports up to 32767 are tried, or up to 65535 when `port` already lies above
/// that range. Port 0 lets the OS pick. Returns the listener and the port it
/// actually got.
pub async fn bind_with_retry(host: IpAddr, port: u16) -> std::io::Result<(TcpListener, u16)> {
    let limit = if port > MAX_RETRY_PORT {
        u16::MAX
    } else {
        MAX_RETRY_PORT
    };
    let mut candidate = port;
    loop {
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                let bound = listener.local_addr()?.port();
                return Ok((listener, bound));
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse && candidate != 0 && candidate < limit => {
                debug!("Port {} in use, trying {}", candidate, candidate + 1);
                candidate += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Accepts control connections until shutdown is requested.
pub async fn serve(listener: TcpListener, ctx: Arc<ServerContext>) -> Result<()> {
    let mut shutdown = ctx.shutdown_signal();
    info!("Server listening on {}:{}", ctx.host, ctx.port);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                info!("New connection from {}", addr);

                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket, addr, ctx).await {
                        warn!("Connection error from {}: {:#}", addr, e);
                    }
                    info!("Connection closed for {}", addr);
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Shutdown requested, closing listener on port {}", ctx.port);
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Drives one control socket through handshake, authentication and command
/// dispatch.
pub async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> Result<()> {
    socket.set_nodelay(true).ok();
    let mut session = Session::new(addr, ctx.port, false);
    let (read_half, write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let writer: SharedWriter = Arc::new(Mutex::new(write_half));

    {
        let mut write_half = writer.lock().await;
        perform_handshake(&mut reader, &mut *write_half)
            .await
            .context("WebSocket handshake failed")?;
    }
    session.complete_handshake();
    debug!("Handshake complete with {} on port {}", addr, session.port);

    if !authenticate(&mut reader, &writer, &ctx, &mut session).await? {
        info!("Client {} left before authenticating", addr);
        session.terminate();
        return Ok(());
    }

    while session.is_dispatching() {
        let frame = match read_frame(&mut reader, MAX_CONTROL_FRAME_SIZE).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(FramingError::Unmasked) => {
                warn!("Dropping unmasked frame from {}", addr);
                continue;
            }
            Err(e) => return Err(e).context("Failed to read frame"),
        };

        match frame.opcode() {
            Opcode::Close => {
                debug!("Client {} sent close", addr);
                break;
            }
            Opcode::Text | Opcode::Binary => {}
            Opcode::Other(code) => {
                debug!("Ignoring opcode {} from {}", code, addr);
                continue;
            }
        }

        match dispatch(&frame.payload, &writer, &ctx).await? {
            Flow::Continue => {}
            Flow::Close => break,
            Flow::Terminate => {
                info!("Terminate requested by {}", addr);
                session.terminate();
                close_socket(&writer).await;
                ctx.request_shutdown();
                return Ok(());
            }
        }
    }

    session.terminate();
    close_socket(&writer).await;
    Ok(())
}
