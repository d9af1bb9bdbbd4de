use crate::constants::MIN_DIRECTORY_DEPTH;
use crate::core_sandbox::error::FileServerError;
use log::{debug, warn};
use std::path::{Component, Path, PathBuf};

/// Restricts file access to a list of base directories plus a temp directory.
#[derive(Debug, Clone)]
pub struct Sandbox {
    base_directories: Vec<PathBuf>,
    temp_directory: PathBuf,
}

impl Sandbox {
    /// The temp directory is appended to the base list unless a base
    /// directory already contains it.
    pub fn new(mut base_directories: Vec<PathBuf>, temp_directory: PathBuf) -> Self {
        if !base_directories
            .iter()
            .any(|base| has_prefix(&temp_directory, base))
        {
            base_directories.push(temp_directory.clone());
        }
        Self {
            base_directories,
            temp_directory,
        }
    }

    pub fn base_directories(&self) -> &[PathBuf] {
        &self.base_directories
    }

    pub fn temp_directory(&self) -> &Path {
        &self.temp_directory
    }

    /// True when `path` names one of the configured roots itself.
    pub fn is_root(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);
        self.base_directories
            .iter()
            .chain(std::iter::once(&self.temp_directory))
            .any(|root| same_path(&normalized, root))
    }

    /// A path is valid when it is non-empty, lies under a base directory and
    /// no existing component below that base is a symbolic link.
    pub fn validate_filename(&self, path: &Path) -> bool {
        if path.as_os_str().is_empty() {
            return false;
        }
        let normalized = normalize_path(path);
        if !normalized.is_absolute() {
            debug!("Rejecting relative path {:?}", path);
            return false;
        }

        let base = match self
            .base_directories
            .iter()
            .find(|base| has_prefix(&normalized, base))
        {
            Some(base) => base,
            None => {
                debug!("{:?} is outside every base directory", normalized);
                return false;
            }
        };

        let mut current = base.clone();
        let remainder = normalized
            .components()
            .skip(base.components().count())
            .collect::<Vec<_>>();
        for component in remainder {
            current.push(component.as_os_str());
            match std::fs::symlink_metadata(&current) {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    debug!("{:?} crosses symbolic link {:?}", normalized, current);
                    return false;
                }
                Ok(_) => {}
                // Nothing deeper exists either.
                Err(_) => break,
            }
        }
        true
    }

    /// Validates a client supplied path and returns its normalized form.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, FileServerError> {
        let path = Path::new(raw);
        if self.validate_filename(path) {
            Ok(normalize_path(path))
        } else {
            warn!("Sandbox rejected {:?}", raw);
            Err(FileServerError::OutsideSandbox(path.to_path_buf()))
        }
    }
}

/// Resolves `.` and `..` lexically, without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(windows)]
fn comparable(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_lowercase()
}

#[cfg(windows)]
fn has_prefix(path: &Path, base: &Path) -> bool {
    let path = comparable(path);
    let base = comparable(base);
    path == base || path.starts_with(&format!("{}/", base))
}

#[cfg(windows)]
fn same_path(a: &Path, b: &Path) -> bool {
    comparable(a) == comparable(b)
}

#[cfg(not(windows))]
fn has_prefix(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

#[cfg(not(windows))]
fn same_path(a: &Path, b: &Path) -> bool {
    a == b
}

fn directory_depth(path: &Path) -> usize {
    path.components()
        .filter(|c| !matches!(c, Component::Prefix(_)))
        .count()
}

/// Startup check of candidate base directories. Symlinks are resolved to
/// their target, non-directories are dropped and shallow paths such as `/`
/// or `/usr` are refused, except `/tmp`.
pub fn validate_directories(candidates: &[PathBuf]) -> Vec<PathBuf> {
    let mut accepted: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        let normalized = normalize_path(candidate);
        let real = match std::fs::canonicalize(&normalized) {
            Ok(real) => real,
            Err(e) => {
                warn!("Ignoring directory {:?}: {}", candidate, e);
                continue;
            }
        };
        if !real.is_dir() {
            warn!("Ignoring {:?}: not a directory", real);
            continue;
        }
        if directory_depth(&real) < MIN_DIRECTORY_DEPTH && real != Path::new("/tmp") {
            warn!("Ignoring {:?}: too close to the filesystem root", real);
            continue;
        }
        if !accepted.contains(&real) {
            accepted.push(real);
        }
    }
    accepted
}
