use crate::constants::UPLOAD_INITIAL_RESERVE_PACKETS;
use crate::core_upload::checksum::{checksums_match, compute_checksum};
use crate::core_upload::error::UploadError;
use log::{debug, warn};
use serde::Deserialize;
use std::path::PathBuf;

/// Fields of an `uploadfile` command.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    #[serde(rename = "totalSize")]
    pub total_size: u64,
    #[serde(rename = "packetSize")]
    pub packet_size: u64,
    #[serde(default)]
    pub isbinary: bool,
    pub filename: String,
    #[serde(rename = "storageSize", default)]
    pub storage_size: Option<u64>,
    pub checksum: String,
    #[serde(rename = "uploadCount", default)]
    pub upload_count: Option<u64>,
}

/// State of the single upload owned by a transfer task.
///
/// `offset` never exceeds `total_size`; the buffer is only handed out once it
/// is complete and its checksum matches the declared one.
#[derive(Debug)]
pub struct FileInProgress {
    total_size: usize,
    packet_size: usize,
    is_binary: bool,
    name: PathBuf,
    storage_size: usize,
    checksum: String,
    offset: usize,
    data: Vec<u8>,
}

#[derive(Debug)]
pub struct CompletedUpload {
    pub name: PathBuf,
    pub is_binary: bool,
    pub checksum: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum ChunkOutcome {
    NeedMore { offset: usize },
    Complete(CompletedUpload),
}

impl FileInProgress {
    pub fn new(request: &UploadRequest, name: PathBuf) -> Result<Self, UploadError> {
        if request.packet_size == 0 {
            return Err(UploadError::InvalidPacketSize);
        }
        let total_size = request.total_size as usize;
        let packet_size = request.packet_size as usize;
        let storage_size = request.storage_size.unwrap_or(request.total_size) as usize;
        // Declared sizes are only trusted as far as a few packets; the
        // buffer grows as chunks arrive.
        let capacity = total_size.min(packet_size.saturating_mul(UPLOAD_INITIAL_RESERVE_PACKETS));
        Ok(Self {
            total_size,
            packet_size,
            is_binary: request.isbinary,
            name,
            storage_size,
            checksum: request.checksum.clone(),
            offset: 0,
            data: Vec::with_capacity(capacity),
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn remaining(&self) -> usize {
        self.total_size - self.offset
    }

    /// Appends one decoded chunk at the current offset.
    ///
    /// A chunk must be exactly `packet_size` bytes or exactly the remaining
    /// byte count. Rejected chunks leave the state untouched.
    pub fn accept_chunk(&mut self, chunk: &[u8]) -> Result<ChunkOutcome, UploadError> {
        let remaining = self.remaining();
        let len = chunk.len();
        if (len != self.packet_size && len != remaining) || len > remaining {
            warn!(
                "Bad packet size for {:?}: got {}, expected {} or {}",
                self.name, len, self.packet_size, remaining
            );
            return Err(UploadError::ChunkSizeMismatch {
                got: len,
                packet_size: self.packet_size,
                remaining,
            });
        }

        self.data.extend_from_slice(chunk);
        self.offset += len;
        debug!(
            "Received {} of {} bytes for {:?}",
            self.offset, self.total_size, self.name
        );

        if self.offset < self.total_size {
            return Ok(ChunkOutcome::NeedMore {
                offset: self.offset,
            });
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<ChunkOutcome, UploadError> {
        let data = std::mem::take(&mut self.data);
        let computed = compute_checksum(&data);
        if !checksums_match(&self.checksum, &computed) {
            warn!(
                "Checksum mismatch for {:?}: expected {}, computed {}",
                self.name, self.checksum, computed
            );
            return Err(UploadError::ChecksumMismatch { computed });
        }
        debug!(
            "Upload of {:?} complete ({} bytes, storage size {})",
            self.name,
            data.len(),
            self.storage_size
        );
        Ok(ChunkOutcome::Complete(CompletedUpload {
            name: self.name.clone(),
            is_binary: self.is_binary,
            checksum: computed,
            data,
        }))
    }
}
