pub mod checksum;
pub mod error;
pub mod file_in_progress;

pub use checksum::compute_checksum;
pub use error::UploadError;
pub use file_in_progress::{ChunkOutcome, CompletedUpload, FileInProgress, UploadRequest};
