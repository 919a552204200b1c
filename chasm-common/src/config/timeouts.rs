//! Timeout configuration for control-socket calls.
//!
//! The daemon never times a client out and the wire protocol has no
//! keep-alive, so a truncated reply would otherwise block a caller forever.
//! Every call is therefore bounded twice: once while connecting and once for
//! the whole request/response exchange.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Common interface for timeout configuration.
pub trait TimeoutConfig {
    /// Bound on establishing the socket connection.
    fn connect_timeout(&self) -> Duration;

    /// Bound on a full request/response exchange, connection included.
    fn request_timeout(&self) -> Duration;
}

/// Control-socket timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlTimeouts {
    /// Timeout for connecting to the control socket.
    ///
    /// Default: 5 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Timeout for one complete call (connect, send, receive, decode).
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::request_secs")]
    pub request_secs: u64,
}

impl Default for ControlTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            request_secs: defaults::request_secs(),
        }
    }
}

impl TimeoutConfig for ControlTimeouts {
    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

mod defaults {
    pub const fn connect_secs() -> u64 {
        5
    }

    pub const fn request_secs() -> u64 {
        30
    }
}
