use crate::core_filecommand::command::FileSystemOperation;
use crate::core_sandbox::{FileServerError, Sandbox};
use crate::helpers::{send_packet, SharedWriter};
use crate::server::ServerContext;
use log::{debug, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::fs;

/// Expands a glob pattern. Unless `unrestricted` is set, matches outside the
/// sandbox are dropped.
pub fn matching_files(
    pattern: &str,
    sandbox: &Sandbox,
    unrestricted: bool,
) -> Result<Vec<String>, FileServerError> {
    let paths = glob::glob(pattern)
        .map_err(|e| FileServerError::BadRequest(format!("bad pattern {:?}: {}", pattern, e)))?;

    Ok(paths
        .filter_map(Result::ok)
        .filter(|path| {
            let allowed = unrestricted || sandbox.validate_filename(path);
            if !allowed {
                debug!("Glob match {:?} is outside the sandbox", path);
            }
            allowed
        })
        .map(|path| path.to_string_lossy().into_owned())
        .collect())
}

async fn run_operation(
    ctx: &ServerContext,
    operation: FileSystemOperation,
) -> Result<Value, FileServerError> {
    match operation {
        FileSystemOperation::GetFileSize { url } => {
            let path = ctx.sandbox.resolve(&url)?;
            let metadata = fs::metadata(&path)
                .await
                .map_err(|e| FileServerError::io(&path, e))?;
            Ok(json!(metadata.len()))
        }
        FileSystemOperation::IsDirectory { url } => {
            let path = ctx.sandbox.resolve(&url)?;
            let is_dir = fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            Ok(json!(is_dir))
        }
        FileSystemOperation::GetMatchingFiles { url } => {
            let sandbox = Arc::clone(&ctx.sandbox);
            let unrestricted = ctx.config.allow_unsandboxed_glob;
            let matches = tokio::task::spawn_blocking(move || {
                matching_files(&url, &sandbox, unrestricted)
            })
            .await
            .map_err(|e| FileServerError::BadRequest(format!("glob task failed: {}", e)))??;
            Ok(json!(matches))
        }
        FileSystemOperation::MakeDirectory { url } => {
            ctx.store.make_directory(&url).await?;
            Ok(json!(true))
        }
        FileSystemOperation::DeleteDirectory { url } => {
            ctx.store.delete_directory(&url).await?;
            Ok(json!(true))
        }
        FileSystemOperation::Unknown => Err(FileServerError::BadRequest(String::from(
            "unknown filesystem operation",
        ))),
    }
}

/// Handles the `filesystemoperation` command.
///
/// Sandbox and read-only rejections come back to the dispatcher and are sent
/// as `error`. Failures of the operation itself are answered with
/// `filesystemoperationserror`.
pub async fn handle_filesystem_command(
    writer: &SharedWriter,
    ctx: &ServerContext,
    operation: FileSystemOperation,
    id: Option<u64>,
) -> Result<(), FileServerError> {
    let name = operation.name();
    match run_operation(ctx, operation).await {
        Ok(result) => {
            debug!("{} -> {}", name, result);
            send_packet(writer, "filesystemoperations", result, id).await?;
        }
        Err(e) if e.is_rejection() => return Err(e),
        Err(e) => {
            warn!("{} failed: {}", name, e);
            let mut payload = e.to_packet(id);
            payload["operation"] = json!(name);
            send_packet(writer, "filesystemoperationserror", payload, id).await?;
        }
    }
    Ok(())
}
