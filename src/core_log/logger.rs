use chrono::Local;
use env_logger::{Builder, Env};
use std::io::Write;

/// Initializes the logger with a `[timestamp] [LEVEL] message` format.
///
/// `RUST_LOG` overrides the default filter, which is `debug` in verbose mode
/// and `info` otherwise.
pub fn init_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let _ = Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .try_init();
}
