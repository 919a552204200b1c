//! Command-line utility for a NetCHASM daemon
//!
//! Provides operational control over the daemon, including:
//! - Queue and thread pool counters
//! - Host group and per-host inspection
//! - Staging and committing configuration changes
//! - Log level and thread pool tuning

#[cfg(not(unix))]
compile_error!("chasmctl talks to a Unix domain socket and only builds on unix");

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chasm_common::logging::init();

    let cli = chasm::Cli::parse();

    tokio::select! {
        result = chasm::run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; abandoning the in-flight call");
            anyhow::bail!("Interrupted")
        }
    }
}
