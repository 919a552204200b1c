//! Control command definitions and the per-generation protocol seam.
//!
//! A command is a verb plus whitespace-separated arguments. How it is framed
//! on the wire and how its reply is decoded is up to the
//! [`ControlProtocol`] implementation for the configured generation.

pub mod current;
pub mod legacy;

use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use chasm_common::config::ProtocolGeneration;

use crate::{
    codec::MessageKind,
    error::{ControlError, Result},
    symbols::LogLevel,
    transport::Connection,
    types::{DnsSchedInfo, HashHgPair, HostCheckReport, HostGroupConfig, ThreadInfo, Tunable},
};

/// Command verbs, spelled exactly as the daemon expects them
pub mod verbs {
    pub const WORK_QUEUE_INFO: &str = "workqueueinfo";
    pub const THREAD_INFO: &str = "threadinfo";
    pub const SCHEDULE_QUEUE_INFO: &str = "schdqueueinfo";
    pub const HOST_GROUP_LIST: &str = "hostgrouplist";
    pub const HOST_LIST: &str = "hostlist";
    pub const HOST_CHECK: &str = "hostcheck";
    pub const HOST_SCHED_INFO: &str = "hostschdinfo";
    pub const HOST_GROUP_PARAMS: &str = "hostgroupparams";
    pub const CONFIG_HASH: &str = "gettransconfighash";
    pub const ADD_HOST_GROUP: &str = "addhostgroup";
    pub const REMOVE_HOST_GROUP: &str = "removehostgroup";
    pub const CLEAR_TRANSACTION: &str = "cleartransation";
    pub const COMMIT_TRANSACTION: &str = "committransation";
    pub const RELOAD: &str = "reload";
    pub const GET_LOG_LEVEL: &str = "getloglevel";
    pub const SET_LOG_LEVEL: &str = "setloglevel";
    pub const GET_RECYCLE: &str = "getrecycle";
    pub const SET_RECYCLE: &str = "setrecycle";
    pub const HOST_SET: &str = "host_set";
}

/// Reply message a current-generation verb is answered with.
///
/// `None` for verbs that get no reply at all.
#[must_use]
pub fn reply_kind(verb: &str) -> Option<MessageKind> {
    use verbs::*;

    match verb {
        WORK_QUEUE_INFO | SCHEDULE_QUEUE_INFO | COMMIT_TRANSACTION => Some(MessageKind::Uint),
        THREAD_INFO => Some(MessageKind::ThreadInfo),
        HOST_GROUP_LIST | HOST_LIST => Some(MessageKind::List),
        HOST_CHECK => Some(MessageKind::DataCheckResults),
        HOST_SCHED_INFO => Some(MessageKind::DnsSchedInfo),
        HOST_GROUP_PARAMS => Some(MessageKind::DataHostGroup),
        CONFIG_HASH => Some(MessageKind::HashHgPair),
        ADD_HOST_GROUP | REMOVE_HOST_GROUP | CLEAR_TRANSACTION | RELOAD | GET_RECYCLE => {
            Some(MessageKind::Bool)
        }
        GET_LOG_LEVEL => Some(MessageKind::Int),
        verb if verb.starts_with("get") => Some(MessageKind::Uint),
        _ => None,
    }
}

/// A verb and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: &'static str,
    args: Vec<String>,
}

impl Command {
    #[must_use]
    pub const fn new(verb: &'static str) -> Self {
        Self {
            verb,
            args: Vec::new(),
        }
    }

    /// Append an argument supplied by the caller
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidArgument`] if the argument is empty or
    /// contains whitespace, either of which would shift every later argument
    pub fn arg(mut self, arg: &str) -> Result<Self> {
        if arg.is_empty() {
            return Err(ControlError::InvalidArgument(format!(
                "empty argument to {}",
                self.verb
            )));
        }
        if arg.chars().any(char::is_whitespace) {
            return Err(ControlError::InvalidArgument(format!(
                "argument to {} contains whitespace: {arg:?}",
                self.verb
            )));
        }
        self.args.push(arg.to_string());
        Ok(self)
    }

    /// Append a value the client produced itself
    #[must_use]
    pub fn value(mut self, value: impl Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    #[must_use]
    pub const fn verb(&self) -> &'static str {
        self.verb
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

pub(crate) fn unsupported<T>(verb: &'static str, generation: ProtocolGeneration) -> Result<T> {
    Err(ControlError::Unsupported { verb, generation })
}

/// One protocol generation's framing and reply decoding.
///
/// Every method runs a single exchange on a freshly connected `conn`; the
/// caller owns connecting, closing and the time bound. Operations a
/// generation does not offer report `false` from [`ControlProtocol::supports`]
/// and keep the default body, which fails with [`ControlError::Unsupported`].
#[async_trait]
pub trait ControlProtocol: Send + Sync {
    fn generation(&self) -> ProtocolGeneration;

    /// Whether this generation has a command for `verb`
    fn supports(&self, _verb: &str) -> bool {
        true
    }

    /// Pending checks in the work queue
    async fn work_queue_info(&self, conn: &mut Connection) -> Result<u64>;

    async fn thread_info(&self, conn: &mut Connection) -> Result<ThreadInfo>;

    /// Entries in the scheduler queue
    async fn schedule_queue_info(&self, conn: &mut Connection) -> Result<u64>;

    async fn host_group_list(&self, conn: &mut Connection) -> Result<Vec<String>>;

    async fn host_list(&self, conn: &mut Connection, group: &str) -> Result<Vec<String>>;

    async fn host_check(
        &self,
        conn: &mut Connection,
        group: &str,
        host: &str,
    ) -> Result<HostCheckReport>;

    async fn host_sched_info(
        &self,
        conn: &mut Connection,
        group: &str,
        host: &str,
    ) -> Result<DnsSchedInfo>;

    /// `None` when the daemon does not know the group
    async fn host_group_params(
        &self,
        conn: &mut Connection,
        group: &str,
    ) -> Result<Option<HostGroupConfig>>;

    async fn config_hash(&self, _conn: &mut Connection) -> Result<HashHgPair> {
        unsupported(verbs::CONFIG_HASH, self.generation())
    }

    async fn add_host_group(
        &self,
        _conn: &mut Connection,
        _config: &HostGroupConfig,
    ) -> Result<bool> {
        unsupported(verbs::ADD_HOST_GROUP, self.generation())
    }

    async fn remove_host_group(&self, _conn: &mut Connection, _group: &str) -> Result<bool> {
        unsupported(verbs::REMOVE_HOST_GROUP, self.generation())
    }

    async fn clear_transaction(&self, _conn: &mut Connection) -> Result<bool> {
        unsupported(verbs::CLEAR_TRANSACTION, self.generation())
    }

    /// Number of changes applied; zero when `hash` no longer matches
    async fn commit_transaction(&self, _conn: &mut Connection, _hash: &HashHgPair) -> Result<u64> {
        unsupported(verbs::COMMIT_TRANSACTION, self.generation())
    }

    async fn reload(&self, _conn: &mut Connection, _config_dir: Option<&str>) -> Result<bool> {
        unsupported(verbs::RELOAD, self.generation())
    }

    async fn log_level(&self, _conn: &mut Connection) -> Result<LogLevel> {
        unsupported(verbs::GET_LOG_LEVEL, self.generation())
    }

    async fn set_log_level(&self, _conn: &mut Connection, _level: LogLevel) -> Result<()> {
        unsupported(verbs::SET_LOG_LEVEL, self.generation())
    }

    async fn tunable(&self, _conn: &mut Connection, tunable: Tunable) -> Result<u64> {
        unsupported(tunable.get_verb(), self.generation())
    }

    async fn set_tunable(&self, _conn: &mut Connection, tunable: Tunable, _value: u64) -> Result<()> {
        unsupported(tunable.set_verb(), self.generation())
    }

    async fn recycle(&self, _conn: &mut Connection) -> Result<bool> {
        unsupported(verbs::GET_RECYCLE, self.generation())
    }

    async fn set_recycle(&self, _conn: &mut Connection, _enabled: bool) -> Result<()> {
        unsupported(verbs::SET_RECYCLE, self.generation())
    }

    async fn set_force_host_down(
        &self,
        _conn: &mut Connection,
        _group: &str,
        _host: &str,
        _down: bool,
    ) -> Result<()> {
        unsupported(verbs::HOST_SET, self.generation())
    }
}

/// Build the protocol implementation for `generation`
#[must_use]
pub fn for_generation(
    generation: ProtocolGeneration,
    max_frame_size: u64,
) -> Box<dyn ControlProtocol> {
    match generation {
        ProtocolGeneration::Current => Box::new(current::CurrentProtocol::new(max_frame_size)),
        ProtocolGeneration::Legacy => Box::new(legacy::LegacyProtocol::new(max_frame_size)),
    }
}
