//! Current protocol generation: length-prefixed commands, protobuf replies.
//!
//! ```text
//! client -> daemon   u64 BE length | "1 <verb> [args...]"
//!                    [raw blob, for addhostgroup and committransation]
//! daemon -> client   u64 BE length | protobuf payload
//! ```

use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use chasm_common::{config::ProtocolGeneration, incoming, internal, outgoing};
use prost::Message;

use super::{Command, ControlProtocol, verbs};
use crate::{
    codec::{self, Reply},
    error::{ControlError, Result},
    projection,
    symbols::LogLevel,
    transport::Connection,
    types::{DnsSchedInfo, HashHgPair, HostCheckReport, HostGroupConfig, ThreadInfo, Tunable},
};

/// Version tag prefixed to every command line
pub const CONTROL_SOCKET_VERSION: u32 = 1;

/// Where an exchange has got to, for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Connected,
    SentCommand,
    AwaitLength,
    AwaitPayload,
    Decoded,
}

impl Display for ExchangeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connected => "CONNECTED",
            Self::SentCommand => "SENT_COMMAND",
            Self::AwaitLength => "AWAIT_LENGTH",
            Self::AwaitPayload => "AWAIT_PAYLOAD",
            Self::Decoded => "DECODED",
        })
    }
}

/// The 8-byte big-endian length packet that precedes every payload
#[must_use]
pub const fn frame_length(len: usize) -> [u8; 8] {
    (len as u64).to_be_bytes()
}

/// The command line as sent, version prefix included
#[must_use]
pub fn command_line(command: &Command) -> String {
    format!("{CONTROL_SOCKET_VERSION} {command}")
}

#[derive(Debug, Clone)]
pub struct CurrentProtocol {
    max_frame_size: u64,
}

impl CurrentProtocol {
    #[must_use]
    pub const fn new(max_frame_size: u64) -> Self {
        Self { max_frame_size }
    }

    async fn send(&self, conn: &mut Connection, command: &Command, blob: Option<&[u8]>) -> Result<()> {
        internal!("{} {}", command.verb(), ExchangeState::Connected);

        let line = command_line(command);
        outgoing!("{line}");
        conn.send_packet(&frame_length(line.len())).await?;
        conn.send_packet(line.as_bytes()).await?;

        if let Some(blob) = blob.filter(|blob| !blob.is_empty()) {
            outgoing!("{} byte blob for {}", blob.len(), command.verb());
            conn.send_packet(blob).await?;
        }

        internal!("{} {}", command.verb(), ExchangeState::SentCommand);
        Ok(())
    }

    /// Read one reply frame; an empty payload for a zero length
    async fn receive(&self, conn: &mut Connection, verb: &'static str) -> Result<Vec<u8>> {
        internal!("{verb} {}", ExchangeState::AwaitLength);
        let size = u64::from_be_bytes(conn.recv_array::<8>().await?);
        incoming!("{verb} reply length {size}");

        if size > self.max_frame_size {
            return Err(ControlError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        internal!("{verb} {}", ExchangeState::AwaitPayload);
        let len = usize::try_from(size).map_err(|_| ControlError::FrameTooLarge {
            size,
            max: self.max_frame_size,
        })?;
        conn.recv_exact(len).await
    }

    /// Send `command` and decode its reply as `M`
    async fn request<M: Reply>(
        &self,
        conn: &mut Connection,
        command: Command,
        blob: Option<&[u8]>,
    ) -> Result<M> {
        self.send(conn, &command, blob).await?;
        let payload = self.receive(conn, command.verb()).await?;
        let reply = M::decode_reply(&payload)?;
        internal!("{} {} as {}", command.verb(), ExchangeState::Decoded, M::KIND);
        Ok(reply)
    }

    /// Send a command the daemon does not answer
    async fn notify(&self, conn: &mut Connection, command: Command) -> Result<()> {
        self.send(conn, &command, None).await
    }
}

#[async_trait]
impl ControlProtocol for CurrentProtocol {
    fn generation(&self) -> ProtocolGeneration {
        ProtocolGeneration::Current
    }

    async fn work_queue_info(&self, conn: &mut Connection) -> Result<u64> {
        let reply: codec::Uint = self
            .request(conn, Command::new(verbs::WORK_QUEUE_INFO), None)
            .await?;
        Ok(reply.data)
    }

    async fn thread_info(&self, conn: &mut Connection) -> Result<ThreadInfo> {
        let reply: codec::ThreadInfo = self
            .request(conn, Command::new(verbs::THREAD_INFO), None)
            .await?;
        Ok(projection::thread_info(&reply))
    }

    async fn schedule_queue_info(&self, conn: &mut Connection) -> Result<u64> {
        let reply: codec::Uint = self
            .request(conn, Command::new(verbs::SCHEDULE_QUEUE_INFO), None)
            .await?;
        Ok(reply.data)
    }

    async fn host_group_list(&self, conn: &mut Connection) -> Result<Vec<String>> {
        let reply: codec::List = self
            .request(conn, Command::new(verbs::HOST_GROUP_LIST), None)
            .await?;
        Ok(reply.items)
    }

    async fn host_list(&self, conn: &mut Connection, group: &str) -> Result<Vec<String>> {
        let command = Command::new(verbs::HOST_LIST).arg(group)?;
        let reply: codec::List = self.request(conn, command, None).await?;
        Ok(reply.items)
    }

    async fn host_check(
        &self,
        conn: &mut Connection,
        group: &str,
        host: &str,
    ) -> Result<HostCheckReport> {
        let command = Command::new(verbs::HOST_CHECK).arg(group)?.arg(host)?;
        let reply: codec::DataCheckResults = self.request(conn, command, None).await?;
        Ok(HostCheckReport::Results(projection::check_results(&reply)?))
    }

    async fn host_sched_info(
        &self,
        conn: &mut Connection,
        group: &str,
        host: &str,
    ) -> Result<DnsSchedInfo> {
        let command = Command::new(verbs::HOST_SCHED_INFO).arg(group)?.arg(host)?;
        self.send(conn, &command, None).await?;

        let payload = self.receive(conn, verbs::HOST_SCHED_INFO).await?;
        if payload.is_empty() {
            return Err(ControlError::EmptyReply {
                verb: verbs::HOST_SCHED_INFO,
            });
        }

        let reply = codec::DnsSchedInfo::decode_reply(&payload)?;
        Ok(projection::wire_dns_sched_info(&reply)?)
    }

    async fn host_group_params(
        &self,
        conn: &mut Connection,
        group: &str,
    ) -> Result<Option<HostGroupConfig>> {
        let command = Command::new(verbs::HOST_GROUP_PARAMS).arg(group)?;
        self.send(conn, &command, None).await?;

        let payload = self.receive(conn, verbs::HOST_GROUP_PARAMS).await?;
        if payload.is_empty() {
            return Ok(None);
        }

        let reply = codec::DataHostGroup::decode_reply(&payload)?;
        Ok(Some(projection::host_group(group, reply)?))
    }

    async fn config_hash(&self, conn: &mut Connection) -> Result<HashHgPair> {
        let reply: codec::HashHgPair = self
            .request(conn, Command::new(verbs::CONFIG_HASH), None)
            .await?;
        Ok(projection::hash_pair(reply))
    }

    async fn add_host_group(&self, conn: &mut Connection, config: &HostGroupConfig) -> Result<bool> {
        let blob = projection::wire_host_group(config).encode_to_vec();
        let command = Command::new(verbs::ADD_HOST_GROUP)
            .arg(&config.group_name)?
            .value(blob.len());
        let reply: codec::Bool = self.request(conn, command, Some(&blob)).await?;
        Ok(reply.data)
    }

    async fn remove_host_group(&self, conn: &mut Connection, group: &str) -> Result<bool> {
        let command = Command::new(verbs::REMOVE_HOST_GROUP).arg(group)?;
        let reply: codec::Bool = self.request(conn, command, None).await?;
        Ok(reply.data)
    }

    async fn clear_transaction(&self, conn: &mut Connection) -> Result<bool> {
        let reply: codec::Bool = self
            .request(conn, Command::new(verbs::CLEAR_TRANSACTION), None)
            .await?;
        Ok(reply.data)
    }

    async fn commit_transaction(&self, conn: &mut Connection, hash: &HashHgPair) -> Result<u64> {
        let blob = projection::wire_hash_pair(hash).encode_to_vec();
        let command = Command::new(verbs::COMMIT_TRANSACTION).value(blob.len());
        let reply: codec::Uint = self.request(conn, command, Some(&blob)).await?;
        Ok(reply.data)
    }

    async fn reload(&self, conn: &mut Connection, config_dir: Option<&str>) -> Result<bool> {
        let mut command = Command::new(verbs::RELOAD);
        if let Some(dir) = config_dir {
            command = command.arg(dir)?;
        }
        let reply: codec::Bool = self.request(conn, command, None).await?;
        Ok(reply.data)
    }

    async fn log_level(&self, conn: &mut Connection) -> Result<LogLevel> {
        let reply: codec::Int = self
            .request(conn, Command::new(verbs::GET_LOG_LEVEL), None)
            .await?;
        Ok(LogLevel::from_code(reply.data)?)
    }

    async fn set_log_level(&self, conn: &mut Connection, level: LogLevel) -> Result<()> {
        let command = Command::new(verbs::SET_LOG_LEVEL).arg(level.symbol())?;
        self.notify(conn, command).await
    }

    async fn tunable(&self, conn: &mut Connection, tunable: Tunable) -> Result<u64> {
        let reply: codec::Uint = self
            .request(conn, Command::new(tunable.get_verb()), None)
            .await?;
        Ok(reply.data)
    }

    async fn set_tunable(&self, conn: &mut Connection, tunable: Tunable, value: u64) -> Result<()> {
        self.notify(conn, Command::new(tunable.set_verb()).value(value))
            .await
    }

    async fn recycle(&self, conn: &mut Connection) -> Result<bool> {
        let reply: codec::Bool = self
            .request(conn, Command::new(verbs::GET_RECYCLE), None)
            .await?;
        Ok(reply.data)
    }

    async fn set_recycle(&self, conn: &mut Connection, enabled: bool) -> Result<()> {
        let command = Command::new(verbs::SET_RECYCLE).value(if enabled { "on" } else { "off" });
        self.notify(conn, command).await
    }

    async fn set_force_host_down(
        &self,
        conn: &mut Connection,
        group: &str,
        host: &str,
        down: bool,
    ) -> Result<()> {
        let command = Command::new(verbs::HOST_SET)
            .arg(group)?
            .arg(host)?
            .value(u8::from(down));
        self.notify(conn, command).await
    }
}
