//! Command-line surface of `chasmctl`

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use chasm_control::{LogLevel, Tunable};

/// Inspect and steer a running NetCHASM daemon over its control socket
#[derive(Parser, Debug)]
#[command(name = "chasmctl")]
#[command(about = "Control a NetCHASM health-monitoring daemon", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Client config file (RON); see `CHASM_CONFIG`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the control socket, overriding the config file
    #[arg(short = 's', long, global = true)]
    pub socket: Option<PathBuf>,

    /// Speak the legacy fixed-width protocol
    #[arg(long, global = true)]
    pub legacy: bool,

    /// Per-call timeout in seconds
    #[arg(short = 't', long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Work queue, schedule queue and thread pool counters
    Status,
    /// List host groups, or the hosts of one group
    List {
        /// Host group to list hosts for
        group: Option<String>,
    },
    /// Latest check results for a host
    Check { group: String, host: String },
    /// DNS and per-address scheduling for a host
    Schedule { group: String, host: String },
    /// Configuration of a host group
    Params { group: String },
    /// Staged configuration changes
    Stage {
        #[command(subcommand)]
        action: StageAction,
    },
    /// Read or change the daemon's log level
    LogLevel {
        /// New level, e.g. `warning` or `debug2`
        #[arg(value_parser = parse_log_level)]
        level: Option<LogLevel>,
    },
    /// Read or change a thread pool tunable
    Tune {
        #[arg(value_enum)]
        tunable: TunableArg,
        value: Option<u64>,
    },
    /// Read or change thread recycling
    Recycle {
        #[arg(value_enum)]
        state: Option<Toggle>,
    },
    /// Force a host down, or release it
    ForceDown {
        group: String,
        host: String,
        #[arg(value_enum, default_value = "on")]
        state: Toggle,
    },
    /// Reload the daemon's configuration
    Reload {
        /// Directory to load from instead of the daemon's own
        config_dir: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum StageAction {
    /// Show the hash of the staged change set
    Hash,
    /// Stage a new host group from a RON file
    Add { file: PathBuf },
    /// Stage removal of a host group
    Remove { group: String },
    /// Commit the staged change set
    Commit,
    /// Discard the staged change set
    Clear,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TunableArg {
    ConnectionTimeout,
    MonitorFrequency,
    Stride,
    TtlThreshold,
    WorkPerThread,
}

impl From<TunableArg> for Tunable {
    fn from(arg: TunableArg) -> Self {
        match arg {
            TunableArg::ConnectionTimeout => Self::ConnectionTimeout,
            TunableArg::MonitorFrequency => Self::MonitorFrequency,
            TunableArg::Stride => Self::Stride,
            TunableArg::TtlThreshold => Self::TtlThreshold,
            TunableArg::WorkPerThread => Self::WorkPerThreadRatio,
        }
    }
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::from_symbol(value).ok_or_else(|| {
        let known = LogLevel::ALL
            .iter()
            .map(|level| level.symbol())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown log level '{value}' (expected one of: {known})")
    })
}
