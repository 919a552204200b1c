//! Legacy protocol generation: unframed commands, fixed-width replies.
//!
//! Commands go out as bare ASCII with no length prefix or version tag.
//! Replies are the daemon's in-memory structs: little-endian, C natural
//! alignment, padding included. Each record below lists its field offsets.

use async_trait::async_trait;
use chasm_common::{config::ProtocolGeneration, incoming, outgoing};

use super::{Command, ControlProtocol, verbs};
use crate::{
    error::{ControlError, DecodeError, Result},
    projection::{self, RawFamilySchedule},
    symbols::{CheckType, DualStack, Mode, Reason},
    transport::Connection,
    types::{
        DnsSchedInfo, HostCheckReport, HostCheckSummary, HostGroupConfig, HostSchedInfo,
        ThreadInfo,
    },
};

fn le_bytes<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(le_bytes(buf, offset))
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(le_bytes(buf, offset))
}

fn i32_at(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(le_bytes(buf, offset))
}

fn u64_at(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(le_bytes(buf, offset))
}

fn bool_at(buf: &[u8], offset: usize) -> bool {
    buf[offset] != 0
}

/// Host check summary.
///
/// | offset | field                 | type |
/// |--------|-----------------------|------|
/// | 0      | `errnum`              | i32  |
/// | 4      | `check_status`        | bool |
/// | 8      | `status`              | u32  |
/// | 12     | `reason`              | u32  |
/// | 16     | `connect_rt`          | u64  |
/// | 24     | `smoothed_connect_rt` | u64  |
/// | 32     | `total_rt`            | u64  |
/// | 40     | `status_time`         | u64  |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCheckRecord {
    pub errnum: i32,
    pub check_status: bool,
    pub status: u32,
    pub reason: u32,
    pub connect_rt: u64,
    pub smoothed_connect_rt: u64,
    pub total_rt: u64,
    pub status_time: u64,
}

impl HostCheckRecord {
    pub const SIZE: usize = 48;

    #[must_use]
    pub fn decode(buf: &[u8; HostCheckRecord::SIZE]) -> Self {
        Self {
            errnum: i32_at(buf, 0),
            check_status: bool_at(buf, 4),
            status: u32_at(buf, 8),
            reason: u32_at(buf, 12),
            connect_rt: u64_at(buf, 16),
            smoothed_connect_rt: u64_at(buf, 24),
            total_rt: u64_at(buf, 32),
            status_time: u64_at(buf, 40),
        }
    }

    /// `None` if the host has never been checked
    ///
    /// # Errors
    ///
    /// Returns an error if the reason index or status time is invalid
    pub fn project(&self) -> std::result::Result<Option<HostCheckSummary>, DecodeError> {
        if !self.check_status {
            return Ok(None);
        }
        Ok(Some(HostCheckSummary {
            errnum: self.errnum,
            status: self.status,
            reason: Reason::from_index("reason", self.reason)?,
            connect_time: self.connect_rt,
            smoothed_connect_time: self.smoothed_connect_rt,
            total_time: self.total_rt,
            status_time: projection::timestamp("statusTime", self.status_time)?,
        }))
    }
}

/// DNS scheduling header, followed by `count` [`HostSchedRecord`]s.
///
/// | offset | field     | type |
/// |--------|-----------|------|
/// | 0      | `has_v4`  | bool |
/// | 1      | `has_v6`  | bool |
/// | 8      | `v4_last` | u64  |
/// | 16     | `v4_next` | u64  |
/// | 24     | `v4_state`| u8   |
/// | 32     | `v6_last` | u64  |
/// | 40     | `v6_next` | u64  |
/// | 48     | `v6_state`| u8   |
/// | 52     | `count`   | u32  |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsSchedRecord {
    pub has_v4: bool,
    pub has_v6: bool,
    pub v4_last: u64,
    pub v4_next: u64,
    pub v4_state: u8,
    pub v6_last: u64,
    pub v6_next: u64,
    pub v6_state: u8,
    pub count: u32,
}

impl DnsSchedRecord {
    pub const SIZE: usize = 56;

    #[must_use]
    pub fn decode(buf: &[u8; DnsSchedRecord::SIZE]) -> Self {
        Self {
            has_v4: bool_at(buf, 0),
            has_v6: bool_at(buf, 1),
            v4_last: u64_at(buf, 8),
            v4_next: u64_at(buf, 16),
            v4_state: buf[24],
            v6_last: u64_at(buf, 32),
            v6_next: u64_at(buf, 40),
            v6_state: buf[48],
            count: u32_at(buf, 52),
        }
    }

    fn v4(&self) -> RawFamilySchedule {
        RawFamilySchedule {
            present: self.has_v4,
            last_check: self.v4_last,
            next_check: self.v4_next,
            state: u64::from(self.v4_state),
        }
    }

    fn v6(&self) -> RawFamilySchedule {
        RawFamilySchedule {
            present: self.has_v6,
            last_check: self.v6_last,
            next_check: self.v6_next,
            state: u64::from(self.v6_state),
        }
    }
}

/// Per-address scheduling.
///
/// | offset | field     | type     |
/// |--------|-----------|----------|
/// | 0      | `family`  | u8       |
/// | 4      | `words`   | 4 x u32  |
/// | 24     | `last`    | u64      |
/// | 32     | `next`    | u64      |
/// | 40     | `state`   | u8       |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSchedRecord {
    pub family: u8,
    pub words: [u32; 4],
    pub last: u64,
    pub next: u64,
    pub state: u8,
}

impl HostSchedRecord {
    pub const SIZE: usize = 41;

    #[must_use]
    pub fn decode(buf: &[u8; HostSchedRecord::SIZE]) -> Self {
        Self {
            family: buf[0],
            words: [u32_at(buf, 4), u32_at(buf, 8), u32_at(buf, 12), u32_at(buf, 16)],
            last: u64_at(buf, 24),
            next: u64_at(buf, 32),
            state: buf[40],
        }
    }

    /// # Errors
    ///
    /// Returns an error for an unknown family, state or timestamp
    pub fn project(&self) -> std::result::Result<HostSchedInfo, DecodeError> {
        projection::host_sched_info(
            u32::from(self.family),
            self.words,
            self.last,
            self.next,
            u64::from(self.state),
        )
    }
}

/// Host group parameters header, followed by the check-info blob.
///
/// | offset | field               | type |
/// |--------|---------------------|------|
/// | 0      | `check_status`      | bool |
/// | 1      | `check_type`        | u8   |
/// | 2      | `port`              | u16  |
/// | 4      | `dual_stack`        | u8   |
/// | 8      | `check_info_size`   | u32  |
/// | 12     | `smoothing_window`  | u32  |
/// | 16     | `max_flaps`         | u32  |
/// | 20     | `flap_threshold`    | u32  |
/// | 24     | `num_check_retries` | u8   |
/// | 28     | `check_retry_delay` | u32  |
/// | 32     | `group_threshold`   | u32  |
/// | 36     | `slow_threshold`    | u32  |
/// | 40     | `check_timeout`     | u64  |
/// | 48     | `check_ttl`         | u64  |
/// | 56     | `mode`              | u8   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupParamsRecord {
    pub check_status: bool,
    pub check_type: u8,
    pub port: u16,
    pub dual_stack: u8,
    pub check_info_size: u32,
    pub smoothing_window: u32,
    pub max_flaps: u32,
    pub flap_threshold: u32,
    pub num_check_retries: u8,
    pub check_retry_delay: u32,
    pub group_threshold: u32,
    pub slow_threshold: u32,
    pub check_timeout: u64,
    pub check_ttl: u64,
    pub mode: u8,
}

impl GroupParamsRecord {
    pub const SIZE: usize = 57;

    /// Decode the header from the front of `buf`
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if `buf` is shorter than the header
    pub fn decode(buf: &[u8]) -> std::result::Result<Self, DecodeError> {
        if buf.len() < Self::SIZE {
            return Err(DecodeError::Truncated {
                record: "hostgroupparams",
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }
        Ok(Self {
            check_status: bool_at(buf, 0),
            check_type: buf[1],
            port: u16_at(buf, 2),
            dual_stack: buf[4],
            check_info_size: u32_at(buf, 8),
            smoothing_window: u32_at(buf, 12),
            max_flaps: u32_at(buf, 16),
            flap_threshold: u32_at(buf, 20),
            num_check_retries: buf[24],
            check_retry_delay: u32_at(buf, 28),
            group_threshold: u32_at(buf, 32),
            slow_threshold: u32_at(buf, 36),
            check_timeout: u64_at(buf, 40),
            check_ttl: u64_at(buf, 48),
            mode: buf[56],
        })
    }

    /// Check info from the blob that follows the header.
    ///
    /// `check_info_size` counts the terminating NUL; anything past it is
    /// padding. A size larger than the blob is clamped.
    #[must_use]
    pub fn check_info<'a>(&self, trailing: &'a [u8]) -> &'a [u8] {
        let len = usize::try_from(self.check_info_size.saturating_sub(1)).unwrap_or(usize::MAX);
        &trailing[..len.min(trailing.len())]
    }

    /// # Errors
    ///
    /// Returns an error for an out-of-range enumeration or non-UTF-8 check
    /// info
    pub fn project(
        &self,
        group_name: &str,
        trailing: &[u8],
    ) -> std::result::Result<HostGroupConfig, DecodeError> {
        let check_info = String::from_utf8(self.check_info(trailing).to_vec()).map_err(|source| {
            DecodeError::Utf8 {
                record: "checkInfo",
                source,
            }
        })?;

        Ok(HostGroupConfig {
            group_name: group_name.to_string(),
            check_type: CheckType::from_index("checkType", self.check_type)?,
            port: u32::from(self.port),
            dual_stack: DualStack::from_index("dualstack", self.dual_stack)?,
            smoothing_window: self.smoothing_window,
            max_flaps: self.max_flaps,
            flap_threshold: self.flap_threshold,
            num_check_retries: u32::from(self.num_check_retries),
            check_retry_delay: self.check_retry_delay,
            group_threshold: self.group_threshold,
            slow_threshold: self.slow_threshold,
            check_timeout: self.check_timeout,
            check_ttl: self.check_ttl,
            mode: Some(Mode::from_index("mode", self.mode)?),
            passthrough_info: 0,
            check_info,
            hosts: Vec::new(),
            host_groups: Vec::new(),
            remote_check_type: 0,
            distributed_fallback: 0,
            measurement_options: 0,
            remote_check: String::new(),
        })
    }
}

/// Split a comma-separated name list; an empty body is an empty list
///
/// # Errors
///
/// Returns [`DecodeError::Utf8`] naming `record` if the body is not UTF-8
pub fn split_list(
    record: &'static str,
    body: &[u8],
) -> std::result::Result<Vec<String>, DecodeError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let body =
        String::from_utf8(body.to_vec()).map_err(|source| DecodeError::Utf8 { record, source })?;
    Ok(body.split(',').map(str::to_string).collect())
}

/// The only commands older daemons understand
pub const LEGACY_VERBS: &[&str] = &[
    verbs::WORK_QUEUE_INFO,
    verbs::THREAD_INFO,
    verbs::SCHEDULE_QUEUE_INFO,
    verbs::HOST_GROUP_LIST,
    verbs::HOST_LIST,
    verbs::HOST_CHECK,
    verbs::HOST_SCHED_INFO,
    verbs::HOST_GROUP_PARAMS,
];

#[derive(Debug, Clone)]
pub struct LegacyProtocol {
    max_frame_size: u64,
}

impl LegacyProtocol {
    #[must_use]
    pub const fn new(max_frame_size: u64) -> Self {
        Self { max_frame_size }
    }

    async fn send(&self, conn: &mut Connection, command: &Command) -> Result<()> {
        let line = command.to_string();
        outgoing!("{line}");
        conn.send_packet(line.as_bytes()).await
    }

    /// Read a u64 size and then that many bytes
    async fn receive_sized(&self, conn: &mut Connection, verb: &'static str) -> Result<Vec<u8>> {
        let size = u64::from_le_bytes(conn.recv_array::<8>().await?);
        incoming!("{verb} body length {size}");

        if size > self.max_frame_size {
            return Err(ControlError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        let len = usize::try_from(size).map_err(|_| ControlError::FrameTooLarge {
            size,
            max: self.max_frame_size,
        })?;
        conn.recv_exact(len).await
    }

    async fn list(&self, conn: &mut Connection, command: Command) -> Result<Vec<String>> {
        self.send(conn, &command).await?;
        let body = self.receive_sized(conn, command.verb()).await?;
        Ok(split_list(command.verb(), &body)?)
    }
}

#[async_trait]
impl ControlProtocol for LegacyProtocol {
    fn generation(&self) -> ProtocolGeneration {
        ProtocolGeneration::Legacy
    }

    fn supports(&self, verb: &str) -> bool {
        LEGACY_VERBS.contains(&verb)
    }

    async fn work_queue_info(&self, conn: &mut Connection) -> Result<u64> {
        self.send(conn, &Command::new(verbs::WORK_QUEUE_INFO)).await?;
        let raw = conn.recv_array::<4>().await?;
        Ok(u64::from(u32::from_le_bytes(raw)))
    }

    async fn thread_info(&self, conn: &mut Connection) -> Result<ThreadInfo> {
        self.send(conn, &Command::new(verbs::THREAD_INFO)).await?;
        let raw = conn.recv_array::<16>().await?;
        Ok(ThreadInfo {
            total: u64_at(&raw, 0),
            idle: u64_at(&raw, 8),
        })
    }

    async fn schedule_queue_info(&self, conn: &mut Connection) -> Result<u64> {
        self.send(conn, &Command::new(verbs::SCHEDULE_QUEUE_INFO))
            .await?;
        let raw = conn.recv_array::<8>().await?;
        Ok(u64::from_le_bytes(raw))
    }

    async fn host_group_list(&self, conn: &mut Connection) -> Result<Vec<String>> {
        self.list(conn, Command::new(verbs::HOST_GROUP_LIST)).await
    }

    async fn host_list(&self, conn: &mut Connection, group: &str) -> Result<Vec<String>> {
        self.list(conn, Command::new(verbs::HOST_LIST).arg(group)?)
            .await
    }

    async fn host_check(
        &self,
        conn: &mut Connection,
        group: &str,
        host: &str,
    ) -> Result<HostCheckReport> {
        let command = Command::new(verbs::HOST_CHECK).arg(group)?.arg(host)?;
        self.send(conn, &command).await?;

        let raw = conn.recv_array::<{ HostCheckRecord::SIZE }>().await?;
        let record = HostCheckRecord::decode(&raw);
        Ok(HostCheckReport::Summary(record.project()?))
    }

    async fn host_sched_info(
        &self,
        conn: &mut Connection,
        group: &str,
        host: &str,
    ) -> Result<DnsSchedInfo> {
        let command = Command::new(verbs::HOST_SCHED_INFO).arg(group)?.arg(host)?;
        self.send(conn, &command).await?;

        let raw = conn.recv_array::<{ DnsSchedRecord::SIZE }>().await?;
        let header = DnsSchedRecord::decode(&raw);
        incoming!("{} per-address records follow", header.count);

        let mut hosts = Vec::new();
        for _ in 0..header.count {
            let raw = conn.recv_array::<{ HostSchedRecord::SIZE }>().await?;
            hosts.push(HostSchedRecord::decode(&raw).project()?);
        }

        Ok(projection::dns_sched_info(header.v4(), header.v6(), hosts)?)
    }

    async fn host_group_params(
        &self,
        conn: &mut Connection,
        group: &str,
    ) -> Result<Option<HostGroupConfig>> {
        let command = Command::new(verbs::HOST_GROUP_PARAMS).arg(group)?;
        self.send(conn, &command).await?;

        let body = self.receive_sized(conn, verbs::HOST_GROUP_PARAMS).await?;
        if body.is_empty() {
            return Ok(None);
        }

        let header = GroupParamsRecord::decode(&body)?;
        let config = header.project(group, &body[GroupParamsRecord::SIZE..])?;
        Ok(Some(config))
    }
}
