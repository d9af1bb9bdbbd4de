use crate::core_upload::UploadRequest;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Commands accepted on an authenticated control socket, tagged by `command`.
#[derive(Debug, Deserialize)]
#[serde(tag = "command")]
pub enum FileCommand {
    #[serde(rename = "getfilelist")]
    GetFileList {
        #[serde(default)]
        path: String,
        /// `"directory"` restricts the listing to directories.
        #[serde(rename = "type", default)]
        filter: Option<String>,
    },
    #[serde(rename = "readfile")]
    ReadFile {
        filename: String,
        #[serde(default)]
        isbinary: bool,
    },
    #[serde(rename = "uploadfile")]
    UploadFile(UploadRequest),
    #[serde(rename = "getserverbasedirectory")]
    GetServerBaseDirectory,
    #[serde(rename = "getservertempdirectory")]
    GetServerTempDirectory,
    #[serde(rename = "filesystemoperation")]
    FileSystemOperation(FileSystemOperation),
    #[serde(rename = "dicomConversion")]
    DicomConversion { fileinput: String },
    #[serde(rename = "dicom2BIDS")]
    Dicom2Bids { fileinput: String },
    #[serde(rename = "restart")]
    Restart,
    #[serde(rename = "terminate")]
    Terminate,
    #[serde(rename = "ignore")]
    Ignore,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "operation")]
pub enum FileSystemOperation {
    #[serde(rename = "getFileSize")]
    GetFileSize { url: String },
    #[serde(rename = "isDirectory")]
    IsDirectory { url: String },
    #[serde(rename = "getMatchingFiles")]
    GetMatchingFiles { url: String },
    #[serde(rename = "makeDirectory")]
    MakeDirectory { url: String },
    #[serde(rename = "deleteDirectory")]
    DeleteDirectory { url: String },
    #[serde(other)]
    Unknown,
}

impl FileSystemOperation {
    pub fn name(&self) -> &'static str {
        match self {
            FileSystemOperation::GetFileSize { .. } => "getFileSize",
            FileSystemOperation::IsDirectory { .. } => "isDirectory",
            FileSystemOperation::GetMatchingFiles { .. } => "getMatchingFiles",
            FileSystemOperation::MakeDirectory { .. } => "makeDirectory",
            FileSystemOperation::DeleteDirectory { .. } => "deleteDirectory",
            FileSystemOperation::Unknown => "unknown",
        }
    }
}

/// A parsed command together with its correlation id.
#[derive(Debug)]
pub struct Request {
    pub id: Option<u64>,
    pub name: String,
    pub command: FileCommand,
}

#[derive(Debug, Error)]
pub enum RequestError {
    /// Not a JSON object; nothing can be echoed back.
    #[error("malformed command: {0}")]
    Malformed(String),

    /// A known command with missing or mistyped fields.
    #[error("invalid {name} command: {source}")]
    Invalid {
        name: String,
        id: Option<u64>,
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    pub fn id(&self) -> Option<u64> {
        match self {
            RequestError::Malformed(_) => None,
            RequestError::Invalid { id, .. } => *id,
        }
    }
}

pub fn parse_request(payload: &[u8]) -> Result<Request, RequestError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| RequestError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(RequestError::Malformed(String::from("expected a JSON object")));
    }

    let id = value.get("id").and_then(Value::as_u64);
    let name = value
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let command = serde_json::from_value(value).map_err(|source| RequestError::Invalid {
        name: name.clone(),
        id,
        source,
    })?;
    Ok(Request { id, name, command })
}
