use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::binder::{validate_interface_name, BindError, CaptureOptions};
use crate::cli::Args;

const DEFAULT_RECV_TIMEOUT_MS: u64 = 250;
const MAX_RECV_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("config: cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no interface given: pass one on the command line or set capture.interface")]
    MissingInterface,
    #[error(transparent)]
    Interface(#[from] BindError),
    #[error("capture.recv_timeout_ms must be between 1 and 60000, got {0}")]
    RecvTimeout(u64),
}

/// Contents of the optional TOML settings file.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub capture: CaptureSection,
    pub output: OutputSection,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSection {
    pub interface: Option<String>,
    pub promiscuous: bool,
    pub recv_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub path: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Everything the capture run needs, after merging command line and settings file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub interface: String,
    pub capture: CaptureOptions,
    /// `None` means standard output.
    pub output: Option<PathBuf>,
}

impl Settings {
    /// Command line values take precedence over the file, defaults fill the rest.
    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        let interface = args
            .interface
            .clone()
            .or(file.capture.interface)
            .ok_or(ConfigError::MissingInterface)?;
        validate_interface_name(&interface)?;

        let recv_timeout_ms = args
            .recv_timeout_ms
            .or(file.capture.recv_timeout_ms)
            .unwrap_or(DEFAULT_RECV_TIMEOUT_MS);
        if !(1..=MAX_RECV_TIMEOUT_MS).contains(&recv_timeout_ms) {
            return Err(ConfigError::RecvTimeout(recv_timeout_ms));
        }

        Ok(Self {
            interface,
            capture: CaptureOptions {
                promiscuous: args.promiscuous || file.capture.promiscuous,
                recv_timeout: Duration::from_millis(recv_timeout_ms),
            },
            output: args.output.clone().or(file.output.path),
        })
    }

    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }
}
