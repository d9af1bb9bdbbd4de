use crate::config::ServerConfig;
use crate::constants::TERMINATE_GRACE_MS;
use crate::core_auth::OneTimePassword;
use crate::core_network::network;
use crate::core_network::transfer::TransferTimeouts;
use crate::core_sandbox::{build_store, MutableFileStore, Sandbox};
use anyhow::{Context, Result};
use log::{error, info};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Everything a connection needs to serve commands. One per server instance.
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub sandbox: Arc<Sandbox>,
    pub store: Arc<dyn MutableFileStore>,
    pub otp: Mutex<OneTimePassword>,
    pub host: IpAddr,
    pub port: u16,
    pub transfer_timeouts: TransferTimeouts,
    shutdown: watch::Sender<bool>,
}

impl ServerContext {
    /// `config` must already be finalized.
    pub fn new(config: ServerConfig, host: IpAddr, port: u16) -> Self {
        let sandbox = Arc::new(Sandbox::new(
            config.base_directories.clone(),
            config.temp_directory.clone(),
        ));
        let store = build_store(Arc::clone(&sandbox), config.readonly);
        let (shutdown, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            sandbox,
            store,
            otp: Mutex::new(OneTimePassword::new()),
            host,
            port,
            transfer_timeouts: TransferTimeouts::default(),
            shutdown,
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Binds the control port, prints the first password and serves until a
/// client sends `terminate`.
pub async fn run(config: ServerConfig, host: IpAddr, port: u16) -> Result<()> {
    let (listener, port) = network::bind_with_retry(host, port)
        .await
        .with_context(|| format!("Failed to bind a control port from {} upwards", port))?;

    let ctx = Arc::new(ServerContext::new(config, host, port));
    info!("Starting file server on {}:{}", host, port);
    ctx.otp.lock().await.announce(port);

    if let Err(e) = network::serve(listener, Arc::clone(&ctx)).await {
        error!("Server stopped: {}", e);
        return Err(e);
    }

    tokio::time::sleep(Duration::from_millis(TERMINATE_GRACE_MS)).await;
    info!("File server on port {} terminated", port);
    Ok(())
}
