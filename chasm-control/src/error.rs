//! Error types for control operations

use std::{path::PathBuf, time::Duration};

use chasm_common::config::{ConfigError, ProtocolGeneration};
use thiserror::Error;

use crate::codec::MessageKind;

/// Errors that can occur during control operations
#[derive(Debug, Error)]
pub enum ControlError {
    /// The control socket is missing or refused the connection
    #[error("Unable to connect to control socket {path}: {source}")]
    Connection {
        path: PathBuf,
        source: std::io::Error,
    },

    /// I/O error communicating with the control socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The call did not complete within its bound
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// The daemon closed the connection part way through a reply
    #[error("Connection closed after {received} of {expected} bytes")]
    Framing { expected: usize, received: usize },

    /// The announced reply size exceeds the configured maximum
    #[error("Reply too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u64 },

    /// The reply payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The daemon sent a zero-length reply where a payload is required
    #[error("Empty reply to {verb}")]
    EmptyReply { verb: &'static str },

    /// The configured protocol generation has no such command
    #[error("{verb} is not supported by the {generation} protocol")]
    Unsupported {
        verb: &'static str,
        generation: ProtocolGeneration,
    },

    /// An argument would corrupt the command line
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection handle was already closed
    #[error("Connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ControlError {
    /// Whether retrying the same call might succeed.
    ///
    /// Timeouts and transport failures are transient; decode and argument
    /// errors will fail the same way again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Io(_) | Self::Framing { .. } | Self::ConnectionClosed
        )
    }
}

/// Errors raised while turning reply bytes into domain values
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed {kind} message: {source}")]
    Message {
        kind: MessageKind,
        source: prost::DecodeError,
    },

    #[error("{field} index {index} out of range (table has {len} entries)")]
    EnumOutOfRange {
        field: &'static str,
        index: u64,
        len: usize,
    },

    #[error("Unknown address family {family}")]
    AddressFamily { family: u32 },

    #[error("{field} timestamp {millis}ms is not representable")]
    Timestamp { field: &'static str, millis: u64 },

    #[error("{record} record truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{record} is not valid UTF-8: {source}")]
    Utf8 {
        record: &'static str,
        source: std::string::FromUtf8Error,
    },

    #[error("Unknown log level code {0}")]
    LogLevel(i64),

    #[error("Symbol table {table} is inconsistent: {reason}")]
    SymbolTable {
        table: &'static str,
        reason: String,
    },
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
