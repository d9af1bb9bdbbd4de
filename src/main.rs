mod config;
mod constants;
mod core_auth;
mod core_cli;
mod core_filecommand;
mod core_log;
mod core_network;
mod core_sandbox;
mod core_upload;
mod helpers;
mod server;
mod session;

use crate::config::load_config;
use crate::constants::{ALL_INTERFACES, LOCALHOST};
use crate::core_cli::Cli;
use crate::core_log::logger::init_logger;
use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Configuration file and flags first, so `verbose` can come from either
    let config = load_config(&args)?;
    init_logger(config.verbose);
    let config = config.finalize()?;

    if args.createconfig {
        println!("{}", config.to_pretty_json()?);
        return Ok(());
    }

    let host: IpAddr = if args.nolocalhost {
        ALL_INTERFACES
    } else {
        LOCALHOST
    }
    .parse()
    .context("Invalid listen address")?;

    config.log_config();
    server::run(config, host, args.port).await
}
