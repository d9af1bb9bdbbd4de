use crate::constants::DEFAULT_PORT;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "bisfileserver",
    about = "BioImage Suite Web file server: sandboxed file access over a websocket."
)]
pub struct Cli {
    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Port of the control server; uploads use the following ports
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Refuse every command that writes to disk
    #[arg(long)]
    pub readonly: bool,

    /// Accept an empty password
    #[arg(long)]
    pub insecure: bool,

    /// Listen on all interfaces instead of localhost only
    #[arg(long)]
    pub nolocalhost: bool,

    /// Temporary directory for uploads and conversions
    #[arg(long)]
    pub tmpdir: Option<PathBuf>,

    /// Path to a JSON (or .toml) configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub createconfig: bool,
}
