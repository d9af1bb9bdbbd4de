use crate::core_sandbox::{FileServerError, Sandbox};
use crate::helpers::{send_packet, SharedWriter};
use crate::server::ServerContext;
use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One row of a `filelist` reply.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileEntry {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub size: u64,
    pub path: String,
}

impl FileEntry {
    fn is_directory(&self) -> bool {
        self.kind == "directory"
    }
}

/// Lists `directory`, skipping dot-files and symbolic links.
/// Directories come first, then files, each group sorted by name.
pub async fn list_directory(
    directory: &Path,
    directories_only: bool,
) -> Result<Vec<FileEntry>, FileServerError> {
    let mut reader = fs::read_dir(directory)
        .await
        .map_err(|e| FileServerError::io(directory, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| FileServerError::io(directory, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        // DirEntry::metadata does not follow symlinks.
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {:?}: {}", entry.path(), e);
                continue;
            }
        };
        let file_type = metadata.file_type();
        let (kind, size) = if file_type.is_symlink() {
            continue;
        } else if file_type.is_dir() {
            ("directory", 0)
        } else if file_type.is_file() {
            if directories_only {
                continue;
            }
            ("file", metadata.len())
        } else {
            continue;
        };

        entries.push(FileEntry {
            text: name,
            kind,
            size,
            path: entry.path().to_string_lossy().into_owned(),
        });
    }

    entries.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.text.cmp(&b.text))
    });
    Ok(entries)
}

/// Picks the directory to list: the requested one, or the first base
/// directory when the client sends an empty path.
fn listing_root(sandbox: &Sandbox, raw: &str) -> Result<PathBuf, FileServerError> {
    if raw.trim().is_empty() {
        return sandbox
            .base_directories()
            .first()
            .cloned()
            .ok_or_else(|| FileServerError::BadRequest(String::from("no base directory configured")));
    }
    sandbox.resolve(raw)
}

/// Handles the `getfilelist` command.
///
/// # Arguments
///
/// * `writer` - The control socket.
/// * `ctx` - The server instance.
/// * `path` - Directory to list; empty means the first base directory.
/// * `filter` - `Some("directory")` lists directories only.
/// * `id` - Correlation id echoed in the reply.
pub async fn handle_getfilelist_command(
    writer: &SharedWriter,
    ctx: &ServerContext,
    path: &str,
    filter: Option<&str>,
    id: Option<u64>,
) -> Result<(), FileServerError> {
    let directory = listing_root(&ctx.sandbox, path)?;
    let directories_only = filter == Some("directory");
    let entries = list_directory(&directory, directories_only).await?;
    info!("Listing {:?}: {} entries", directory, entries.len());

    send_packet(
        writer,
        "filelist",
        json!({ "path": directory.to_string_lossy(), "data": entries }),
        id,
    )
    .await?;
    Ok(())
}
