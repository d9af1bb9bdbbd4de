// Errors raised while serving a file command
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("{0} is not in an allowed directory")]
    OutsideSandbox(PathBuf),

    #[error("Server is in read-only mode, cannot {0}")]
    ReadOnly(&'static str),

    #[error("Refusing to remove server root directory {0}")]
    ProtectedDirectory(PathBuf),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Cannot open data transfer socket: {0}")]
    TransferSocket(std::io::Error),

    #[error("Connection error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileServerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileServerError::Io {
            path: path.into(),
            source,
        }
    }

    /// Sandbox and capability failures, as opposed to failures of the I/O itself.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FileServerError::OutsideSandbox(_)
                | FileServerError::ReadOnly(_)
                | FileServerError::ProtectedDirectory(_)
        )
    }

    /// Payload of the `error` packet sent back to the client.
    pub fn to_packet(&self, id: Option<u64>) -> Value {
        let text = match self {
            FileServerError::Io { path, source } => match source.kind() {
                ErrorKind::NotFound => format!("{} does not exist", path.display()),
                ErrorKind::PermissionDenied => {
                    format!("Permission denied for {}", path.display())
                }
                ErrorKind::InvalidData => format!("{} is not a text file", path.display()),
                _ => self.to_string(),
            },
            _ => self.to_string(),
        };
        json!({ "text": text, "id": id })
    }
}
