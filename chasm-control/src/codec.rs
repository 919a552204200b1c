//! Protobuf messages carried by current-generation replies.
//!
//! Proto3 omits default-valued fields, so the empty byte string is a valid
//! encoding of every message here: a zero counter, `false`, an empty list, an
//! empty hash.

use std::fmt::{Display, Formatter};

use prost::Message;

use crate::error::DecodeError;

/// Which message a reply payload should hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Uint,
    Int,
    Bool,
    List,
    ThreadInfo,
    DataCheckResults,
    DnsSchedInfo,
    DataHostGroup,
    HashHgPair,
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Uint => "netchasm.Uint",
            Self::Int => "netchasm.Int",
            Self::Bool => "netchasm.Bool",
            Self::List => "netchasm.List",
            Self::ThreadInfo => "netchasm.ThreadInfo",
            Self::DataCheckResults => "netchasm.DataCheckResults",
            Self::DnsSchedInfo => "netchasm.DnsSchedInfo",
            Self::DataHostGroup => "netchasm.DataHostGroup",
            Self::HashHgPair => "netchasm.HashHgPair",
        })
    }
}

/// A message that can stand as a whole reply payload
pub trait Reply: Message + Default {
    const KIND: MessageKind;

    /// Decode a reply payload
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Message`] if `payload` is not a valid encoding
    fn decode_reply(payload: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(payload).map_err(|source| DecodeError::Message {
            kind: Self::KIND,
            source,
        })
    }
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Uint {
    #[prost(uint64, tag = "1")]
    pub data: u64,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Int {
    #[prost(int64, tag = "1")]
    pub data: i64,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Bool {
    #[prost(bool, tag = "1")]
    pub data: bool,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct List {
    #[prost(string, repeated, tag = "1")]
    pub items: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct ThreadInfo {
    #[prost(uint64, tag = "1")]
    pub num_threads: u64,
    #[prost(uint64, tag = "2")]
    pub num_idle_threads: u64,
}

/// Address with the family tag and four raw 32-bit words.
///
/// IPv4 uses `addr0` only; IPv6 uses all four words.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct IpAddress {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, tag = "2")]
    pub addr0: u32,
    #[prost(uint32, tag = "3")]
    pub addr1: u32,
    #[prost(uint32, tag = "4")]
    pub addr2: u32,
    #[prost(uint32, tag = "5")]
    pub addr3: u32,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct DataCheckResult {
    #[prost(message, optional, tag = "1")]
    pub address: Option<IpAddress>,
    #[prost(uint64, tag = "2")]
    pub start_time: u64,
    #[prost(uint64, tag = "3")]
    pub end_time: u64,
    #[prost(uint64, tag = "4")]
    pub response_time: u64,
    #[prost(uint64, tag = "5")]
    pub total_response_time: u64,
    #[prost(uint64, tag = "6")]
    pub min_response_time: u64,
    #[prost(uint64, tag = "7")]
    pub max_response_time: u64,
    #[prost(uint64, tag = "8")]
    pub smoothed_response_time: u64,
    #[prost(uint64, tag = "9")]
    pub sum_response_time: u64,
    #[prost(uint64, tag = "10")]
    pub num_checks: u64,
    #[prost(uint64, tag = "11")]
    pub num_responses: u64,
    #[prost(uint64, tag = "12")]
    pub num_connect_failures: u64,
    #[prost(uint64, tag = "13")]
    pub num_failures: u64,
    #[prost(uint64, tag = "14")]
    pub num_timeouts: u64,
    #[prost(uint64, tag = "15")]
    pub num_flaps: u64,
    #[prost(uint32, tag = "16")]
    pub status: u32,
    #[prost(uint32, tag = "17")]
    pub response: u32,
    #[prost(uint32, tag = "18")]
    pub reason: u32,
    #[prost(uint32, tag = "19")]
    pub soft_reason: u32,
    #[prost(uint64, tag = "20")]
    pub num_failed_checks: u64,
    #[prost(uint64, tag = "21")]
    pub num_slow_responses: u64,
    #[prost(uint32, tag = "22")]
    pub port: u32,
    #[prost(uint64, tag = "23")]
    pub change_time: u64,
    #[prost(bool, tag = "24")]
    pub force_host_down: bool,
    #[prost(uint64, tag = "25")]
    pub queue_check_time: u64,
    #[prost(uint64, tag = "26")]
    pub check_time: u64,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct DataCheckResults {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<DataCheckResult>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct HostSchedInfo {
    #[prost(message, optional, tag = "1")]
    pub address: Option<IpAddress>,
    #[prost(uint64, tag = "2")]
    pub last_check_time: u64,
    #[prost(uint64, tag = "3")]
    pub next_check_time: u64,
    #[prost(uint32, tag = "4")]
    pub state: u32,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct DnsSchedInfo {
    #[prost(bool, tag = "1")]
    pub hasv4: bool,
    #[prost(bool, tag = "2")]
    pub hasv6: bool,
    #[prost(uint64, tag = "3")]
    pub v4_last_check_time: u64,
    #[prost(uint64, tag = "4")]
    pub v4_next_check_time: u64,
    #[prost(uint32, tag = "5")]
    pub v4_state: u32,
    #[prost(uint64, tag = "6")]
    pub v6_last_check_time: u64,
    #[prost(uint64, tag = "7")]
    pub v6_next_check_time: u64,
    #[prost(uint32, tag = "8")]
    pub v6_state: u32,
    #[prost(message, repeated, tag = "9")]
    pub host_sched_info: Vec<HostSchedInfo>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct DataHostGroup {
    #[prost(uint32, tag = "1")]
    pub measurement_options: u32,
    #[prost(uint32, tag = "2")]
    pub dualstack: u32,
    #[prost(uint32, tag = "3")]
    pub check_type: u32,
    #[prost(uint32, tag = "4")]
    pub port: u32,
    #[prost(uint32, tag = "5")]
    pub num_check_retries: u32,
    #[prost(uint32, tag = "6")]
    pub check_retry_delay: u32,
    #[prost(uint32, tag = "7")]
    pub smoothing_window: u32,
    #[prost(uint32, tag = "8")]
    pub group_threshold: u32,
    #[prost(uint32, tag = "9")]
    pub slow_threshold: u32,
    #[prost(uint32, tag = "10")]
    pub max_flaps: u32,
    #[prost(uint64, tag = "11")]
    pub check_timeout: u64,
    #[prost(uint64, tag = "12")]
    pub check_ttl: u64,
    #[prost(uint32, tag = "13")]
    pub flap_threshold: u32,
    #[prost(uint64, tag = "14")]
    pub passthrough_info: u64,
    #[prost(string, tag = "15")]
    pub check_info: String,
    #[prost(string, repeated, tag = "16")]
    pub hosts: Vec<String>,
    #[prost(string, repeated, tag = "17")]
    pub hostgroups: Vec<String>,
    #[prost(uint32, tag = "18")]
    pub remote_check_type: u32,
    #[prost(uint32, tag = "19")]
    pub distributed_fallback: u32,
    #[prost(string, tag = "20")]
    pub remote_check: String,
}

/// Fingerprint of the staged configuration.
///
/// An empty `hash` means nothing is staged.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct HashHgPair {
    #[prost(string, tag = "1")]
    pub group_name: String,
    #[prost(uint64, tag = "2")]
    pub size: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub hash: Vec<u8>,
}

macro_rules! impl_reply {
    ($($message:ident),+ $(,)?) => {
        $(
            impl Reply for $message {
                const KIND: MessageKind = MessageKind::$message;
            }
        )+
    };
}

impl_reply!(
    Uint,
    Int,
    Bool,
    List,
    ThreadInfo,
    DataCheckResults,
    DnsSchedInfo,
    DataHostGroup,
    HashHgPair,
);
