//! Mapping between wire values and domain values.
//!
//! Addresses travel as a family tag plus four 32-bit words holding the raw
//! network-order bytes; times travel as milliseconds since the epoch;
//! enumerations travel as indices into [`crate::symbols`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Local, TimeZone};

use crate::{
    codec,
    error::DecodeError,
    symbols::{CheckType, DualStack, Reason, Response, WorkState},
    types::{
        DnsSchedInfo, FamilySchedule, HashHgPair, HostCheckResult, HostGroupConfig,
        HostSchedInfo, ThreadInfo,
    },
};

/// Linux `AF_INET`
pub const AF_INET: u32 = 2;
/// Linux `AF_INET6`
pub const AF_INET6: u32 = 10;

/// Rebuild an address from its family tag and raw words.
///
/// Each word holds four address bytes in memory order, which on the
/// little-endian hosts the daemon runs on is `to_le_bytes`.
///
/// # Errors
///
/// Returns [`DecodeError::AddressFamily`] for anything but IPv4 or IPv6
pub fn address(family: u32, words: [u32; 4]) -> Result<IpAddr, DecodeError> {
    match family {
        AF_INET => Ok(IpAddr::V4(Ipv4Addr::from(words[0].to_le_bytes()))),
        AF_INET6 => {
            let mut octets = [0u8; 16];
            for (chunk, word) in octets.chunks_exact_mut(4).zip(words) {
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        family => Err(DecodeError::AddressFamily { family }),
    }
}

/// Inverse of [`address`]
#[must_use]
pub fn address_words(addr: IpAddr) -> (u32, [u32; 4]) {
    match addr {
        IpAddr::V4(v4) => (AF_INET, [u32::from_le_bytes(v4.octets()), 0, 0, 0]),
        IpAddr::V6(v6) => {
            let octets = v6.octets();
            let mut words = [0u32; 4];
            for (word, chunk) in words.iter_mut().zip(octets.chunks_exact(4)) {
                *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            (AF_INET6, words)
        }
    }
}

/// Epoch milliseconds as local time
///
/// # Errors
///
/// Returns [`DecodeError::Timestamp`] if `millis` is outside chrono's range
pub fn timestamp(field: &'static str, millis: u64) -> Result<DateTime<Local>, DecodeError> {
    i64::try_from(millis)
        .ok()
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .ok_or(DecodeError::Timestamp { field, millis })
}

fn wire_address(addr: Option<&codec::IpAddress>) -> Result<IpAddr, DecodeError> {
    // A missing submessage decodes like an all-zero one: family 0.
    let addr = addr.cloned().unwrap_or_default();
    address(addr.r#type, [addr.addr0, addr.addr1, addr.addr2, addr.addr3])
}

pub(crate) fn thread_info(info: &codec::ThreadInfo) -> ThreadInfo {
    ThreadInfo {
        total: info.num_threads,
        idle: info.num_idle_threads,
    }
}

pub(crate) fn check_result(result: &codec::DataCheckResult) -> Result<HostCheckResult, DecodeError> {
    Ok(HostCheckResult {
        address: wire_address(result.address.as_ref())?,
        start: timestamp("checkStartTime", result.start_time)?,
        end: timestamp("checkEndTime", result.end_time)?,
        response_time: result.response_time,
        total_response_time: result.total_response_time,
        min_response_time: result.min_response_time,
        max_response_time: result.max_response_time,
        smoothed_response_time: result.smoothed_response_time,
        sum_response_time: result.sum_response_time,
        num_checks: result.num_checks,
        num_responses: result.num_responses,
        num_connect_failures: result.num_connect_failures,
        num_failures: result.num_failures,
        num_timeouts: result.num_timeouts,
        num_flaps: result.num_flaps,
        status: result.status,
        response: Response::from_index("response", result.response)?,
        reason: Reason::from_index("reason", result.reason)?,
        soft_reason: Reason::from_index("softReason", result.soft_reason)?,
        num_failed_checks: result.num_failed_checks,
        num_slow_responses: result.num_slow_responses,
        port: result.port,
        change_time: timestamp("changeTime", result.change_time)?,
        force_host_down: result.force_host_down,
        queue_check_time: timestamp("queueCheckTime", result.queue_check_time)?,
        check_time: timestamp("checkTime", result.check_time)?,
    })
}

pub(crate) fn check_results(
    results: &codec::DataCheckResults,
) -> Result<Vec<HostCheckResult>, DecodeError> {
    results.results.iter().map(check_result).collect()
}

/// Raw family-level scheduling fields shared by both generations
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RawFamilySchedule {
    pub present: bool,
    pub last_check: u64,
    pub next_check: u64,
    pub state: u64,
}

impl RawFamilySchedule {
    fn project(self, prefix: &'static str) -> Result<Option<FamilySchedule>, DecodeError> {
        if !self.present {
            return Ok(None);
        }
        let (last, next, state) = match prefix {
            "v4" => ("v4LastCheckTime", "v4NextCheckTime", "v4State"),
            _ => ("v6LastCheckTime", "v6NextCheckTime", "v6State"),
        };
        Ok(Some(FamilySchedule {
            last_check: timestamp(last, self.last_check)?,
            next_check: timestamp(next, self.next_check)?,
            state: WorkState::from_index(state, self.state)?,
        }))
    }
}

pub(crate) fn dns_sched_info(
    v4: RawFamilySchedule,
    v6: RawFamilySchedule,
    hosts: Vec<HostSchedInfo>,
) -> Result<DnsSchedInfo, DecodeError> {
    Ok(DnsSchedInfo {
        v4: v4.project("v4")?,
        v6: v6.project("v6")?,
        hosts,
    })
}

pub(crate) fn host_sched_info(
    family: u32,
    words: [u32; 4],
    last_check: u64,
    next_check: u64,
    state: u64,
) -> Result<HostSchedInfo, DecodeError> {
    Ok(HostSchedInfo {
        address: address(family, words)?,
        last_check: timestamp("lastCheckTime", last_check)?,
        next_check: timestamp("nextCheckTime", next_check)?,
        state: WorkState::from_index("state", state)?,
    })
}

pub(crate) fn wire_dns_sched_info(info: &codec::DnsSchedInfo) -> Result<DnsSchedInfo, DecodeError> {
    let hosts = info
        .host_sched_info
        .iter()
        .map(|host| -> Result<HostSchedInfo, DecodeError> {
            Ok(HostSchedInfo {
                address: wire_address(host.address.as_ref())?,
                last_check: timestamp("lastCheckTime", host.last_check_time)?,
                next_check: timestamp("nextCheckTime", host.next_check_time)?,
                state: WorkState::from_index("state", host.state)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    dns_sched_info(
        RawFamilySchedule {
            present: info.hasv4,
            last_check: info.v4_last_check_time,
            next_check: info.v4_next_check_time,
            state: u64::from(info.v4_state),
        },
        RawFamilySchedule {
            present: info.hasv6,
            last_check: info.v6_last_check_time,
            next_check: info.v6_next_check_time,
            state: u64::from(info.v6_state),
        },
        hosts,
    )
}

pub(crate) fn host_group(
    group_name: &str,
    group: codec::DataHostGroup,
) -> Result<HostGroupConfig, DecodeError> {
    Ok(HostGroupConfig {
        group_name: group_name.to_string(),
        check_type: CheckType::from_index("checkType", group.check_type)?,
        port: group.port,
        dual_stack: DualStack::from_index("dualstack", group.dualstack)?,
        smoothing_window: group.smoothing_window,
        max_flaps: group.max_flaps,
        flap_threshold: group.flap_threshold,
        num_check_retries: group.num_check_retries,
        check_retry_delay: group.check_retry_delay,
        group_threshold: group.group_threshold,
        slow_threshold: group.slow_threshold,
        check_timeout: group.check_timeout,
        check_ttl: group.check_ttl,
        mode: None,
        passthrough_info: group.passthrough_info,
        check_info: group.check_info,
        hosts: group.hosts,
        host_groups: group.hostgroups,
        remote_check_type: group.remote_check_type,
        distributed_fallback: group.distributed_fallback,
        measurement_options: group.measurement_options,
        remote_check: group.remote_check,
    })
}

/// Encode a group for staging
pub(crate) fn wire_host_group(config: &HostGroupConfig) -> codec::DataHostGroup {
    codec::DataHostGroup {
        measurement_options: config.measurement_options,
        dualstack: config.dual_stack.index(),
        check_type: config.check_type.index(),
        port: config.port,
        num_check_retries: config.num_check_retries,
        check_retry_delay: config.check_retry_delay,
        smoothing_window: config.smoothing_window,
        group_threshold: config.group_threshold,
        slow_threshold: config.slow_threshold,
        max_flaps: config.max_flaps,
        check_timeout: config.check_timeout,
        check_ttl: config.check_ttl,
        flap_threshold: config.flap_threshold,
        passthrough_info: config.passthrough_info,
        check_info: config.check_info.clone(),
        hosts: config.hosts.clone(),
        hostgroups: config.host_groups.clone(),
        remote_check_type: config.remote_check_type,
        distributed_fallback: config.distributed_fallback,
        remote_check: config.remote_check.clone(),
    }
}

pub(crate) fn hash_pair(pair: codec::HashHgPair) -> HashHgPair {
    HashHgPair {
        group_name: pair.group_name,
        size: pair.size,
        hash: pair.hash,
    }
}

pub(crate) fn wire_hash_pair(pair: &HashHgPair) -> codec::HashHgPair {
    codec::HashHgPair {
        group_name: pair.group_name.clone(),
        size: pair.size,
        hash: pair.hash.clone(),
    }
}
