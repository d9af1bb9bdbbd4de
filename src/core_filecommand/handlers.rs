use crate::core_filecommand::command::{parse_request, FileCommand, RequestError};
use crate::core_filecommand::{
    dicom, directories, filesystem, getfilelist, readfile, restart, uploadfile,
};
use crate::core_sandbox::FileServerError;
use crate::helpers::{send_error, SharedWriter};
use crate::server::ServerContext;
use log::{debug, info, warn};
use std::sync::Arc;

/// What the connection loop does after a command has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
    Terminate,
}

/// Parses one command frame and runs it.
///
/// Failures of the command itself are reported to the client as `error`
/// packets; only a broken control socket is returned as `Err`.
pub async fn dispatch(
    payload: &[u8],
    writer: &SharedWriter,
    ctx: &Arc<ServerContext>,
) -> Result<Flow, std::io::Error> {
    let request = match parse_request(payload) {
        Ok(request) => request,
        Err(RequestError::Malformed(reason)) => {
            warn!("Dropping malformed command: {}", reason);
            return Ok(Flow::Continue);
        }
        Err(e) => {
            warn!("{}", e);
            let err = FileServerError::BadRequest(e.to_string());
            send_error(writer, &err, e.id()).await?;
            return Ok(Flow::Continue);
        }
    };

    let id = request.id;
    info!("Received command: {} (id {:?})", request.name, id);

    let result = match request.command {
        FileCommand::GetFileList { path, filter } => {
            getfilelist::handle_getfilelist_command(writer, ctx, &path, filter.as_deref(), id).await
        }
        FileCommand::ReadFile { filename, isbinary } => {
            readfile::handle_readfile_command(writer, ctx, &filename, isbinary, id).await
        }
        FileCommand::UploadFile(upload) => {
            uploadfile::handle_uploadfile_command(writer, ctx, upload, id).await
        }
        FileCommand::GetServerBaseDirectory => {
            directories::handle_base_directory_command(writer, ctx, id).await
        }
        FileCommand::GetServerTempDirectory => {
            directories::handle_temp_directory_command(writer, ctx, id).await
        }
        FileCommand::FileSystemOperation(operation) => {
            filesystem::handle_filesystem_command(writer, ctx, operation, id).await
        }
        FileCommand::DicomConversion { fileinput } => {
            dicom::handle_dicom_command(writer, ctx, &fileinput, false, id).await
        }
        FileCommand::Dicom2Bids { fileinput } => {
            dicom::handle_dicom_command(writer, ctx, &fileinput, true, id).await
        }
        FileCommand::Restart => {
            restart::handle_restart_command(writer, id).await?;
            return Ok(Flow::Close);
        }
        FileCommand::Terminate => return Ok(Flow::Terminate),
        FileCommand::Ignore => {
            debug!("Ignoring command (id {:?})", id);
            Ok(())
        }
        FileCommand::Unknown => {
            warn!("Unrecognized command {:?} (id {:?})", request.name, id);
            Ok(())
        }
    };

    match result {
        Ok(()) => Ok(Flow::Continue),
        Err(FileServerError::Socket(e)) => Err(e),
        Err(e) => {
            warn!("Command {} failed: {}", request.name, e);
            send_error(writer, &e, id).await?;
            Ok(Flow::Continue)
        }
    }
}
