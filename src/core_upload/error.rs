// Errors raised by the chunked upload engine
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
    #[error("packet size must be positive")]
    InvalidPacketSize,

    #[error("chunk of {got} bytes is neither the packet size {packet_size} nor the {remaining} remaining bytes")]
    ChunkSizeMismatch {
        got: usize,
        packet_size: usize,
        remaining: usize,
    },

    #[error("checksum mismatch, computed {computed}")]
    ChecksumMismatch { computed: String },

    #[error("no upload in progress")]
    NotInProgress,
}
