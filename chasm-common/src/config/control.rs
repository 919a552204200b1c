//! Control-socket client configuration.
//!
//! Loaded from RON, every field optional:
//!
//! ```ron
//! (
//!     socket_path: "/home/y/var/run/netchasm/controlsocket",
//!     generation: current,
//!     timeouts: (connect_secs: 5, request_secs: 30),
//!     max_frame_size: 16777216,
//! )
//! ```

use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ControlTimeouts;

/// Well-known location of the daemon's control socket
pub const DEFAULT_CONTROL_SOCKET: &str = "/home/y/var/run/netchasm/controlsocket";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which wire generation the daemon speaks.
///
/// The two generations are not bit-compatible; a deployment runs exactly one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolGeneration {
    /// Length-prefixed commands with protobuf-encoded replies
    #[default]
    Current,
    /// Unframed commands with fixed-width positional replies
    Legacy,
}

impl Display for ProtocolGeneration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    #[serde(default)]
    pub generation: ProtocolGeneration,

    #[serde(default)]
    pub timeouts: ControlTimeouts,

    /// Largest reply payload accepted before it is allocated
    ///
    /// Default: 16 MiB
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: u64,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONTROL_SOCKET)
}

const fn default_max_frame_size() -> u64 {
    16 * 1024 * 1024
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            generation: ProtocolGeneration::default(),
            timeouts: ControlTimeouts::default(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl ControlConfig {
    /// Configuration for the given socket, everything else defaulted
    #[must_use]
    pub fn with_socket(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }

    /// Parse a RON document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid RON or fails validation
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a RON config file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&content)
    }

    /// Reject values that would make every call fail
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("socket_path must not be empty".into()));
        }
        if self.timeouts.request_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.request_secs must be greater than zero".into(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
