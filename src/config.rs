use crate::constants::DEFAULT_DICOM_CONVERTER;
use crate::core_cli::Cli;
use crate::core_sandbox::validator::{validate_directories, Sandbox};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of one server instance. Key names match the configuration
/// files written by `--createconfig`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub verbose: bool,
    #[serde(rename = "baseDirectoriesList")]
    pub base_directories: Vec<PathBuf>,
    pub readonly: bool,
    pub insecure: bool,
    #[serde(rename = "tempDirectory")]
    pub temp_directory: PathBuf,
    /// Lets `getMatchingFiles` return paths outside the base directories.
    #[serde(rename = "allowUnsandboxedGlob")]
    pub allow_unsandboxed_glob: bool,
    #[serde(rename = "dicomConverter")]
    pub dicom_converter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            base_directories: dirs::home_dir().into_iter().collect(),
            readonly: false,
            insecure: false,
            temp_directory: std::env::temp_dir(),
            allow_unsandboxed_glob: false,
            dicom_converter: String::from(DEFAULT_DICOM_CONVERTER),
        }
    }
}

impl ServerConfig {
    /// Reads a configuration file. Files ending in `.toml` are TOML, anything
    /// else is JSON.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let config = if is_toml {
            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?
        } else {
            serde_json::from_str(&config_str)
                .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?
        };
        Ok(config)
    }

    /// Applies command line options on top of file values. Flags can only
    /// switch a setting on; `--tmpdir` replaces the temp directory.
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        self.verbose |= cli.verbose;
        self.readonly |= cli.readonly;
        self.insecure |= cli.insecure;
        if let Some(tmpdir) = &cli.tmpdir {
            self.temp_directory = tmpdir.clone();
        }
        self
    }

    /// Validates the directories and makes sure the temp directory is one of
    /// the base directories.
    pub fn finalize(mut self) -> Result<Self> {
        let temp_directory = match validate_directories(std::slice::from_ref(&self.temp_directory))
            .into_iter()
            .next()
        {
            Some(temp) => temp,
            None => bail!(
                "Temporary directory {} is not usable",
                self.temp_directory.display()
            ),
        };

        let base_directories = validate_directories(&self.base_directories);
        if base_directories.is_empty() {
            warn!("No usable base directory configured, serving the temp directory only");
        }

        let sandbox = Sandbox::new(base_directories, temp_directory.clone());
        self.base_directories = sandbox.base_directories().to_vec();
        self.temp_directory = temp_directory;
        Ok(self)
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to render configuration")
    }

    pub fn log_config(&self) {
        info!("  Base Directories: {:?}", self.base_directories);
        info!("  Temp Directory: {}", self.temp_directory.display());
        info!("  Read Only: {}", self.readonly);
        info!("  Insecure: {}", self.insecure);
        info!("  DICOM Converter: {}", self.dicom_converter);
        if self.allow_unsandboxed_glob {
            warn!("  getMatchingFiles is NOT restricted to the base directories");
        }
    }
}

/// Reads the optional configuration file and applies the command line.
/// Directories are checked later by `ServerConfig::finalize`.
pub fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let config = match &cli.config {
        Some(path) => ServerConfig::load_from_file(path)?,
        None => ServerConfig::default(),
    };
    Ok(config.merge_cli(cli))
}
