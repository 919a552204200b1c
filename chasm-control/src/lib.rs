//! Client for the NetCHASM health-monitoring daemon's control socket
//!
//! The daemon listens on a local stream socket and answers one command per
//! connection. This crate provides:
//! - Queue, thread and per-host inspection
//! - Host group configuration queries
//! - Staged configuration changes with hash-checked commits
//! - Daemon tuning (log level, thread pool knobs, forced host state)
//!
//! Two incompatible wire generations exist. The current one frames commands
//! with a length prefix and answers with protobuf messages; the legacy one
//! sends bare commands and answers with fixed-width structs. Pick one with
//! [`chasm_common::config::ProtocolGeneration`].

pub mod client;
pub mod codec;
pub mod error;
pub mod projection;
pub mod protocol;
pub mod symbols;
pub mod transaction;
pub mod transport;
pub mod types;

pub use chasm_common::config::{ControlConfig, DEFAULT_CONTROL_SOCKET, ProtocolGeneration};
pub use client::ControlClient;
pub use error::{ControlError, DecodeError, Result};
pub use symbols::{
    CheckType, DualStack, LogLevel, Mode, Reason, Response, WorkState, validate_symbol_tables,
};
pub use transaction::{CommitOutcome, Transaction, TransactionState};
pub use types::{
    DnsSchedInfo, FamilySchedule, HashHgPair, HostCheckReport, HostCheckResult, HostCheckSummary,
    HostGroupConfig, HostSchedInfo, ThreadInfo, Tunable,
};
