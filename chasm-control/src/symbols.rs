//! Symbol tables shared by both protocol generations.
//!
//! Every enumeration on the wire travels as a small unsigned index into one
//! of these tables. Decoding an index past the end of its table is an error,
//! never a panic.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

macro_rules! symbol_table {
    (
        $(#[$meta:meta])*
        $name:ident, $len:literal {
            $($variant:ident => $symbol:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every entry, in wire-index order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Number of entries the daemon defines for this table
            pub const LEN: usize = $len;

            /// Human-readable symbol for this entry
            #[must_use]
            pub const fn symbol(self) -> &'static str {
                match self {
                    $(Self::$variant => $symbol),+
                }
            }

            /// Wire index of this entry
            #[must_use]
            pub const fn index(self) -> u32 {
                self as u32
            }

            /// Resolve a wire index, naming `field` in the error
            ///
            /// # Errors
            ///
            /// Returns [`DecodeError::EnumOutOfRange`] when `index` is past
            /// the end of the table
            pub fn from_index(field: &'static str, index: impl Into<u64>) -> Result<Self, DecodeError> {
                let index = index.into();
                usize::try_from(index)
                    .ok()
                    .and_then(|i| Self::ALL.get(i).copied())
                    .ok_or(DecodeError::EnumOutOfRange {
                        field,
                        index,
                        len: Self::ALL.len(),
                    })
            }

            fn check_table() -> Result<(), DecodeError> {
                let table = stringify!($name);
                if Self::ALL.len() != Self::LEN {
                    return Err(DecodeError::SymbolTable {
                        table,
                        reason: format!("expected {} entries, found {}", Self::LEN, Self::ALL.len()),
                    });
                }
                for (position, entry) in Self::ALL.iter().enumerate() {
                    if entry.index() as usize != position {
                        return Err(DecodeError::SymbolTable {
                            table,
                            reason: format!("{} is at position {position}", entry.symbol()),
                        });
                    }
                    if Self::ALL[..position].iter().any(|other| other.symbol() == entry.symbol()) {
                        return Err(DecodeError::SymbolTable {
                            table,
                            reason: format!("duplicate symbol {}", entry.symbol()),
                        });
                    }
                }
                Ok(())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.symbol())
            }
        }
    };
}

symbol_table! {
    /// Health-check flavour of a host group
    CheckType, 14 {
        Default => "HM_CHECK_DEFAULT",
        None => "HM_CHECK_NONE",
        Http => "HM_CHECK_HTTP",
        Https => "HM_CHECK_HTTPS",
        Tcp => "HM_CHECK_TCP",
        Ftp => "HM_CHECK_FTP",
        Dns => "HM_CHECK_DNS",
        DnsVc => "HM_CHECK_DNSVC",
        HttpsNoPeerCheck => "HM_CHECK_HTTPS_NO_PEER_CHECK",
        Ftps => "HM_CHECK_FTPS",
        FtpsExplicitNoPeerCheck => "HM_CHECK_FTPS_EXPLICIT_NO_PEER_CHECK",
        AuxHttp => "HM_CHECK_AUX_HTTP",
        AuxHttps => "HM_CHECK_AUX_HTTPS",
        AuxHttpsNoPeerCheck => "HM_CHECK_AUX_HTTPS_NO_PEER_CHECK",
    }
}

symbol_table! {
    /// Address families a group resolves and checks
    DualStack, 3 {
        V4Only => "IPv4 only",
        V6Only => "IPv6 only",
        Both => "Both",
    }
}

symbol_table! {
    /// Why a check ended the way it did
    Reason, 17 {
        None => "HM_REASON_NONE",
        Success => "HM_REASON_SUCCESS",
        DnsNotFound => "HM_REASON_DNS_NOTFOUND",
        DnsTimeout => "HM_REASON_DNS_TIMEOUT",
        DnsFailure => "HM_REASON_DNS_FAILURE",
        YnetNotFound => "HM_REASON_YNET_NOTFOUND",
        ConnectTimeout => "HM_REASON_CONNECT_TIMEOUT",
        ConnectFailure => "HM_REASON_CONNECT_FAILURE",
        RequestFailure => "HM_REASON_REQUEST_FAILURE",
        ResponseTimeout => "HM_REASON_RESPONSE_TIMEOUT",
        ResponseFailure => "HM_REASON_RESPONSE_FAILURE",
        ResponseDown => "HM_REASON_RESPONSE_DOWN",
        Response404 => "HM_REASON_RESPONSE_404",
        Response403 => "HM_REASON_RESPONSE_403",
        Response3xx => "HM_REASON_RESPONSE_3XX",
        Response5xx => "HM_REASON_RESPONSE_5XX",
        InternalError => "HM_REASON_INTERNAL_ERROR",
    }
}

symbol_table! {
    /// Scheduling state of a pending check
    WorkState, 4 {
        Inactive => "HM_CHECK_INACTIVE",
        Queued => "HM_CHECK_QUEUED",
        InProgress => "HM_CHECK_IN_PROGRESS",
        Failed => "HM_CHECK_FAILED",
    }
}

symbol_table! {
    /// Coarse outcome of the last check
    Response, 4 {
        None => "RESPONSE_NONE",
        Connected => "RESPONSE_CONNECTED",
        Failed => "RESPONSE_FAILED",
        DnsFailed => "RESPONSE_DNS_FAILED",
    }
}

symbol_table! {
    /// Load-balancing mode a legacy group reports
    Mode, 12 {
        GroupRtRr => "HM_MODE_GROUP_RT_RR",
        GroupRtRandom => "HM_MODE_GROUP_RT_RANDOM",
        BestRt => "HM_MODE_BEST_RT",
        Fallback => "HM_MODE_FALLBACK",
        SingleActive => "HM_MODE_SINGLE_ACTIVE",
        GroupRtAll => "HM_MODE_GROUP_RT_ALL",
        AllActive => "HM_MODE_ALL_ACTIVE",
        GroupRtLocalRr => "HM_MODE_GROUP_RT_LOCAL_RR",
        LoadFb => "HM_MODE_LOADFB",
        GroupRtHash => "HM_MODE_GROUP_RT_HASH",
        GroupRtHashAll => "HM_MODE_GROUP_RT_HASH_ALL",
        GroupLeastConns => "HM_MODE_GROUP_LEAST_CONNS",
    }
}

/// Daemon log verbosity.
///
/// Unlike the tables above this one is keyed by a signed code, not an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    LogError = -2,
    None = -1,
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
    Debug2 = 8,
    Debug3 = 9,
}

impl LogLevel {
    pub const ALL: &'static [Self] = &[
        Self::LogError,
        Self::None,
        Self::Emergency,
        Self::Alert,
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Notice,
        Self::Info,
        Self::Debug,
        Self::Debug2,
        Self::Debug3,
    ];

    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// # Errors
    ///
    /// Returns [`DecodeError::LogLevel`] for codes outside -2..=9
    pub fn from_code(code: i64) -> Result<Self, DecodeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.code() == code)
            .ok_or(DecodeError::LogLevel(code))
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::LogError => "LOG ERROR",
            Self::None => "none",
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Debug2 => "debug2",
            Self::Debug3 => "debug3",
        }
    }

    /// Look a level up by its symbol, ignoring case
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.symbol().eq_ignore_ascii_case(symbol))
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Check every table for the expected length, ordering and unique symbols.
///
/// Run once when a client is built so a mis-edited table is caught before
/// any reply is decoded against it.
///
/// # Errors
///
/// Returns [`DecodeError::SymbolTable`] naming the first inconsistent table
pub fn validate_symbol_tables() -> Result<(), DecodeError> {
    CheckType::check_table()?;
    DualStack::check_table()?;
    Reason::check_table()?;
    WorkState::check_table()?;
    Response::check_table()?;
    Mode::check_table()?;
    Ok(())
}
