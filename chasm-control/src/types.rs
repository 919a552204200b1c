//! Domain values returned by control operations.
//!
//! These are what callers see regardless of which protocol generation
//! produced them.

use std::{
    fmt::{Display, Formatter},
    net::IpAddr,
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::symbols::{CheckType, DualStack, Mode, Reason, Response, WorkState};

/// Render a timestamp for display
#[must_use]
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub total: u64,
    pub idle: u64,
}

impl Display for ThreadInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} threads, {} idle", self.total, self.idle)
    }
}

/// Full per-address result of the most recent check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCheckResult {
    pub address: IpAddr,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub response_time: u64,
    pub total_response_time: u64,
    pub min_response_time: u64,
    pub max_response_time: u64,
    pub smoothed_response_time: u64,
    pub sum_response_time: u64,
    pub num_checks: u64,
    pub num_responses: u64,
    pub num_connect_failures: u64,
    pub num_failures: u64,
    pub num_timeouts: u64,
    pub num_flaps: u64,
    pub status: u32,
    pub response: Response,
    pub reason: Reason,
    pub soft_reason: Reason,
    pub num_failed_checks: u64,
    pub num_slow_responses: u64,
    pub port: u32,
    pub change_time: DateTime<Local>,
    pub force_host_down: bool,
    pub queue_check_time: DateTime<Local>,
    pub check_time: DateTime<Local>,
}

impl Display for HostCheckResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} port {}", self.address, self.port)?;
        writeln!(
            f,
            "  window:    {} -> {}",
            format_timestamp(&self.start),
            format_timestamp(&self.end)
        )?;
        writeln!(
            f,
            "  response:  {} ({}, soft {})",
            self.response, self.reason, self.soft_reason
        )?;
        writeln!(
            f,
            "  rt:        last {} min {} max {} smoothed {}",
            self.response_time,
            self.min_response_time,
            self.max_response_time,
            self.smoothed_response_time
        )?;
        writeln!(
            f,
            "  queued:    {} checked {}",
            format_timestamp(&self.queue_check_time),
            format_timestamp(&self.check_time)
        )?;
        writeln!(
            f,
            "  checks:    {} ({} responses, {} failures, {} timeouts, {} flaps)",
            self.num_checks, self.num_responses, self.num_failures, self.num_timeouts, self.num_flaps
        )?;
        write!(
            f,
            "  changed:   {}{}",
            format_timestamp(&self.change_time),
            if self.force_host_down {
                " (forced down)"
            } else {
                ""
            }
        )
    }
}

/// The coarse summary older daemons return for a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCheckSummary {
    pub errnum: i32,
    pub status: u32,
    pub reason: Reason,
    pub connect_time: u64,
    pub smoothed_connect_time: u64,
    pub total_time: u64,
    pub status_time: DateTime<Local>,
}

impl Display for HostCheckSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "status {} reason {} errno {} rt {}/{}/{} at {}",
            self.status,
            self.reason,
            self.errnum,
            self.connect_time,
            self.smoothed_connect_time,
            self.total_time,
            format_timestamp(&self.status_time)
        )
    }
}

/// Result of a host check query; the shape depends on protocol generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCheckReport {
    /// One full result per resolved address
    Results(Vec<HostCheckResult>),
    /// Legacy summary; `None` when the host has never been checked
    Summary(Option<HostCheckSummary>),
}

impl HostCheckReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Results(results) => results.is_empty(),
            Self::Summary(summary) => summary.is_none(),
        }
    }
}

impl Display for HostCheckReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Results(results) if results.is_empty() => f.write_str("No results"),
            Self::Results(results) => {
                for (i, result) in results.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{result}")?;
                }
                Ok(())
            }
            Self::Summary(None) => f.write_str("Not checked"),
            Self::Summary(Some(summary)) => write!(f, "{summary}"),
        }
    }
}

/// Scheduling of one resolved address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSchedInfo {
    pub address: IpAddr,
    pub last_check: DateTime<Local>,
    pub next_check: DateTime<Local>,
    pub state: WorkState,
}

/// Scheduling of DNS resolution for one address family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilySchedule {
    pub last_check: DateTime<Local>,
    pub next_check: DateTime<Local>,
    pub state: WorkState,
}

/// DNS and per-address scheduling for a host.
///
/// A family's schedule is present exactly when the daemon resolves that
/// family for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsSchedInfo {
    pub v4: Option<FamilySchedule>,
    pub v6: Option<FamilySchedule>,
    pub hosts: Vec<HostSchedInfo>,
}

impl Display for DnsSchedInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (family, schedule) in [("IPv4", &self.v4), ("IPv6", &self.v6)] {
            match schedule {
                Some(s) => writeln!(
                    f,
                    "{family} DNS: {} last {} next {}",
                    s.state,
                    format_timestamp(&s.last_check),
                    format_timestamp(&s.next_check)
                )?,
                None => writeln!(f, "{family} DNS: not resolved")?,
            }
        }
        for host in &self.hosts {
            writeln!(
                f,
                "  {}: {} last {} next {}",
                host.address,
                host.state,
                format_timestamp(&host.last_check),
                format_timestamp(&host.next_check)
            )?;
        }
        Ok(())
    }
}

/// Configuration of one host group.
///
/// Also the input to staging a new group, so it deserializes from RON with
/// everything past the first four fields optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroupConfig {
    pub group_name: String,
    pub check_type: CheckType,
    pub port: u32,
    pub dual_stack: DualStack,
    #[serde(default)]
    pub smoothing_window: u32,
    #[serde(default)]
    pub max_flaps: u32,
    #[serde(default)]
    pub flap_threshold: u32,
    #[serde(default)]
    pub num_check_retries: u32,
    #[serde(default)]
    pub check_retry_delay: u32,
    #[serde(default)]
    pub group_threshold: u32,
    #[serde(default)]
    pub slow_threshold: u32,
    #[serde(default)]
    pub check_timeout: u64,
    #[serde(default)]
    pub check_ttl: u64,
    /// Load-balancing mode; only older daemons report it
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Opaque per-group data for downstream consumers
    #[serde(default)]
    pub passthrough_info: u64,
    #[serde(default)]
    pub check_info: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub host_groups: Vec<String>,
    #[serde(default)]
    pub remote_check_type: u32,
    #[serde(default)]
    pub distributed_fallback: u32,
    #[serde(default)]
    pub measurement_options: u32,
    #[serde(default)]
    pub remote_check: String,
}

impl Display for HostGroupConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.group_name)?;
        writeln!(f, "  check:        {} port {}", self.check_type, self.port)?;
        writeln!(f, "  dual stack:   {}", self.dual_stack)?;
        if !self.check_info.is_empty() {
            writeln!(f, "  check info:   {}", self.check_info)?;
        }
        if let Some(mode) = self.mode {
            writeln!(f, "  mode:         {mode}")?;
        }
        writeln!(
            f,
            "  smoothing:    {} (max flaps {}, flap threshold {})",
            self.smoothing_window, self.max_flaps, self.flap_threshold
        )?;
        writeln!(
            f,
            "  retries:      {} every {}",
            self.num_check_retries, self.check_retry_delay
        )?;
        writeln!(
            f,
            "  thresholds:   group {} slow {}",
            self.group_threshold, self.slow_threshold
        )?;
        write!(
            f,
            "  timeout/ttl:  {}/{}",
            self.check_timeout, self.check_ttl
        )?;
        if !self.hosts.is_empty() {
            write!(f, "\n  hosts:        {}", self.hosts.join(", "))?;
        }
        if !self.host_groups.is_empty() {
            write!(f, "\n  host groups:  {}", self.host_groups.join(", "))?;
        }
        Ok(())
    }
}

/// Fingerprint of the staged configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HashHgPair {
    pub group_name: String,
    pub size: u64,
    pub hash: Vec<u8>,
}

impl HashHgPair {
    /// Nothing is staged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }
}

impl Display for HashHgPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("No staged changes");
        }
        write!(
            f,
            "{} ({} bytes) {}",
            self.group_name,
            self.size,
            hex::encode(&self.hash)
        )
    }
}

/// Daemon tuning knobs readable and writable over the control socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tunable {
    ConnectionTimeout,
    MonitorFrequency,
    Stride,
    TtlThreshold,
    WorkPerThreadRatio,
}

impl Tunable {
    pub const ALL: &'static [Self] = &[
        Self::ConnectionTimeout,
        Self::MonitorFrequency,
        Self::Stride,
        Self::TtlThreshold,
        Self::WorkPerThreadRatio,
    ];

    #[must_use]
    pub const fn get_verb(self) -> &'static str {
        match self {
            Self::ConnectionTimeout => "getconnectiontimeout",
            Self::MonitorFrequency => "getmonitorfrequency",
            Self::Stride => "getstride",
            Self::TtlThreshold => "getttlthreshold",
            Self::WorkPerThreadRatio => "getworkperthreadratio",
        }
    }

    #[must_use]
    pub const fn set_verb(self) -> &'static str {
        match self {
            Self::ConnectionTimeout => "setconnectiontimeout",
            Self::MonitorFrequency => "setmonitorfrequency",
            Self::Stride => "setstride",
            Self::TtlThreshold => "setttlthreshold",
            Self::WorkPerThreadRatio => "setworkperthreadratio",
        }
    }

    /// Short name used on the command line
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ConnectionTimeout => "connection-timeout",
            Self::MonitorFrequency => "monitor-frequency",
            Self::Stride => "stride",
            Self::TtlThreshold => "ttl-threshold",
            Self::WorkPerThreadRatio => "work-per-thread",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl Display for Tunable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_empty_hash_is_sentinel() {
        assert!(HashHgPair::default().is_empty());
        assert_eq!(HashHgPair::default().to_string(), "No staged changes");

        let staged = HashHgPair {
            group_name: "web".into(),
            size: 2,
            hash: vec![0xab, 0x01],
        };
        assert!(!staged.is_empty());
        assert_eq!(staged.to_string(), "web (2 bytes) ab01");
    }

    #[test]
    fn test_host_group_config_from_ron() {
        let config: HostGroupConfig = ron::from_str(
            r#"(
                group_name: "web.example.com",
                check_type: Https,
                port: 443,
                dual_stack: Both,
                check_info: "/status",
                hosts: ["a.example.com", "b.example.com"],
            )"#,
        )
        .unwrap();

        assert_eq!(config.check_type, CheckType::Https);
        assert_eq!(config.dual_stack, DualStack::Both);
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.mode, None);
        assert_eq!(config.check_timeout, 0);
    }

    #[test]
    fn test_tunable_names_round_trip() {
        for tunable in Tunable::ALL {
            assert_eq!(Tunable::from_name(tunable.name()), Some(*tunable));
            assert!(tunable.get_verb().starts_with("get"));
            assert!(tunable.set_verb().starts_with("set"));
        }
    }

    #[test]
    fn test_report_emptiness() {
        assert!(HostCheckReport::Results(Vec::new()).is_empty());
        assert!(HostCheckReport::Summary(None).is_empty());
        assert_eq!(HostCheckReport::Summary(None).to_string(), "Not checked");
    }
}
