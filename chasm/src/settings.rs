//! Resolving the client configuration from file, environment and flags

use std::path::{Path, PathBuf};

use chasm_common::config::{ControlConfig, ProtocolGeneration};

use crate::cli::Cli;

pub const CONFIG_ENV: &str = "CHASM_CONFIG";

const DEFAULT_PATHS: [&str; 2] = ["./chasm.config.ron", "/etc/chasm/chasm.config.ron"];

/// Find the configuration file using the following precedence:
/// 1. `--config`
/// 2. `CHASM_CONFIG` environment variable
/// 3. ./chasm.config.ron (current working directory)
/// 4. /etc/chasm/chasm.config.ron (system-wide config)
///
/// `None` means run with defaults.
///
/// # Errors
///
/// Returns an error if an explicitly named file does not exist
pub fn find_config_file(explicit: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("Config file does not exist: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    Ok(DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// Load the config file, if any, and apply command-line overrides
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or the result is
/// invalid
pub fn resolve(cli: &Cli) -> anyhow::Result<ControlConfig> {
    let mut config = match find_config_file(cli.config.as_deref())? {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            ControlConfig::from_file(&path)?
        }
        None => ControlConfig::default(),
    };

    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut ControlConfig, cli: &Cli) {
    if let Some(socket) = &cli.socket {
        config.socket_path.clone_from(socket);
    }
    if cli.legacy {
        config.generation = ProtocolGeneration::Legacy;
    }
    if let Some(secs) = cli.timeout {
        config.timeouts.request_secs = secs;
    }
}
