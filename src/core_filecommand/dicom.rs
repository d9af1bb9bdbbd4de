use crate::core_sandbox::FileServerError;
use crate::helpers::{send_packet, SharedWriter};
use crate::server::ServerContext;
use chrono::Local;
use log::{debug, error, info, warn};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Command line for the converter: compressed NIfTI named by protocol and
/// series, plus BIDS sidecars when `bids` is set.
pub fn converter_args(input: &Path, output: &Path, bids: bool) -> Vec<String> {
    let sidecars: &[&str] = if bids {
        &["-b", "y", "-ba", "y"]
    } else {
        &["-b", "n"]
    };
    let mut args: Vec<String> = ["-z", "y", "-f", "%p_%s"]
        .iter()
        .chain(sidecars)
        .map(|flag| flag.to_string())
        .collect();
    args.push(String::from("-o"));
    args.push(output.to_string_lossy().into_owned());
    args.push(input.to_string_lossy().into_owned());
    args
}

/// Fresh, timestamped output directory under the temp directory.
pub fn output_directory(temp: &Path, bids: bool) -> PathBuf {
    let prefix = if bids { "bids" } else { "dicom" };
    temp.join(format!("{}_{}", prefix, Local::now().format("%Y%m%d_%H%M%S_%3f")))
}

/// Handles `dicomConversion` and `dicom2BIDS`.
///
/// Validates the input directory, creates the output directory and starts
/// the converter on its own task. Progress and the final result are sent
/// as they happen; the control socket keeps serving other commands.
pub async fn handle_dicom_command(
    writer: &SharedWriter,
    ctx: &ServerContext,
    fileinput: &str,
    bids: bool,
    id: Option<u64>,
) -> Result<(), FileServerError> {
    let input = ctx.sandbox.resolve(fileinput)?;
    let metadata = fs::metadata(&input)
        .await
        .map_err(|e| FileServerError::io(&input, e))?;
    if !metadata.is_dir() {
        return Err(FileServerError::BadRequest(format!(
            "{} is not a directory",
            input.display()
        )));
    }

    let output = output_directory(ctx.sandbox.temp_directory(), bids);
    fs::create_dir_all(&output)
        .await
        .map_err(|e| FileServerError::io(&output, e))?;
    info!("Converting {:?} into {:?} (bids: {})", input, output, bids);

    let converter = ctx.config.dicom_converter.clone();
    let writer = writer.clone();
    tokio::spawn(async move {
        if let Err(e) = run_conversion(&writer, &converter, &input, &output, bids, id).await {
            warn!("Lost client during DICOM conversion: {}", e);
        }
    });
    Ok(())
}

async fn run_conversion(
    writer: &SharedWriter,
    converter: &str,
    input: &Path,
    output: &Path,
    bids: bool,
    id: Option<u64>,
) -> Result<(), std::io::Error> {
    let mut child = match Command::new(converter)
        .args(converter_args(input, output, bids))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            let text = format!("Failed to start {}: {}", converter, e);
            error!("{}", text);
            return send_packet(writer, "dicomConversionError", json!({ "text": text }), id).await;
        }
    };

    // Drained on its own task so a chatty converter cannot fill the pipe.
    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        })
    });

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            debug!("{}: {}", converter, line);
            send_packet(writer, "dicomConversionProgress", json!(line), id).await?;
        }
    }

    let status = child.wait().await?;
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    if status.success() {
        info!("Conversion into {:?} done", output);
        send_packet(
            writer,
            "dicomConversionDone",
            json!({ "output": output.to_string_lossy(), "bids": bids }),
            id,
        )
        .await
    } else {
        let text = format!("{} exited with {}: {}", converter, status, stderr.trim());
        warn!("{}", text);
        send_packet(writer, "dicomConversionError", json!({ "text": text }), id).await
    }
}
