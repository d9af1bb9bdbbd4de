use crate::core_sandbox::error::FileServerError;
use crate::core_sandbox::validator::Sandbox;
use async_trait::async_trait;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Every operation that changes the filesystem goes through this trait.
///
/// The server holds exactly one implementation, picked from the `readonly`
/// setting, so handlers never test the flag themselves.
#[async_trait]
pub trait MutableFileStore: Send + Sync {
    /// Fails before any transfer is set up when writes are not allowed.
    fn check_upload(&self, destination: &str) -> Result<PathBuf, FileServerError>;

    async fn write_file(&self, destination: &Path, contents: &[u8]) -> Result<(), FileServerError>;

    async fn make_directory(&self, raw: &str) -> Result<PathBuf, FileServerError>;

    async fn delete_directory(&self, raw: &str) -> Result<PathBuf, FileServerError>;
}

pub fn build_store(sandbox: Arc<Sandbox>, readonly: bool) -> Arc<dyn MutableFileStore> {
    if readonly {
        Arc::new(ReadOnlyStore)
    } else {
        Arc::new(WritableStore { sandbox })
    }
}

pub struct ReadOnlyStore;

#[async_trait]
impl MutableFileStore for ReadOnlyStore {
    fn check_upload(&self, _destination: &str) -> Result<PathBuf, FileServerError> {
        Err(FileServerError::ReadOnly("upload files"))
    }

    async fn write_file(&self, _destination: &Path, _contents: &[u8]) -> Result<(), FileServerError> {
        Err(FileServerError::ReadOnly("write files"))
    }

    async fn make_directory(&self, _raw: &str) -> Result<PathBuf, FileServerError> {
        Err(FileServerError::ReadOnly("create directories"))
    }

    async fn delete_directory(&self, _raw: &str) -> Result<PathBuf, FileServerError> {
        Err(FileServerError::ReadOnly("delete directories"))
    }
}

pub struct WritableStore {
    sandbox: Arc<Sandbox>,
}

#[async_trait]
impl MutableFileStore for WritableStore {
    fn check_upload(&self, destination: &str) -> Result<PathBuf, FileServerError> {
        self.sandbox.resolve(destination)
    }

    async fn write_file(&self, destination: &Path, contents: &[u8]) -> Result<(), FileServerError> {
        // The path may have changed since the upload was announced.
        if !self.sandbox.validate_filename(destination) {
            return Err(FileServerError::OutsideSandbox(destination.to_path_buf()));
        }
        fs::write(destination, contents)
            .await
            .map_err(|e| FileServerError::io(destination, e))?;
        info!("Wrote {} bytes to {:?}", contents.len(), destination);
        Ok(())
    }

    async fn make_directory(&self, raw: &str) -> Result<PathBuf, FileServerError> {
        let path = self.sandbox.resolve(raw)?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| FileServerError::io(&path, e))?;
        info!("Directory created: {:?}", path);
        Ok(path)
    }

    async fn delete_directory(&self, raw: &str) -> Result<PathBuf, FileServerError> {
        let path = self.sandbox.resolve(raw)?;
        if self.sandbox.is_root(&path) {
            warn!("Refusing to delete server root {:?}", path);
            return Err(FileServerError::ProtectedDirectory(path));
        }
        fs::remove_dir_all(&path)
            .await
            .map_err(|e| FileServerError::io(&path, e))?;
        info!("Directory removed: {:?}", path);
        Ok(path)
    }
}
