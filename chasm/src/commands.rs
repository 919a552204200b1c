//! Command handlers: one client call (or a short sequence) per subcommand

use std::path::Path;

use chasm_control::{CommitOutcome, ControlClient, HostGroupConfig, Tunable};

use crate::cli::{Cli, Commands, StageAction};

/// Execute the parsed command line
///
/// # Errors
///
/// Returns an error if configuration is invalid or the daemon call fails
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::settings::resolve(&cli)?;
    let client = ControlClient::new(config)?;
    tracing::debug!(
        "Using {} protocol on {}",
        client.generation(),
        client.socket_path().display()
    );

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::List { group } => cmd_list(&client, group.as_deref()).await,
        Commands::Check { group, host } => {
            let report = client.host_check(&group, &host).await?;
            if report.is_empty() {
                println!("No check results for {host} in {group}");
            } else {
                println!("{report}");
            }
            Ok(())
        }
        Commands::Schedule { group, host } => {
            println!("{}", client.host_sched_info(&group, &host).await?);
            Ok(())
        }
        Commands::Params { group } => {
            match client.host_group_params(&group).await? {
                Some(config) => println!("{config}"),
                None => println!("Unknown host group {group}"),
            }
            Ok(())
        }
        Commands::Stage { action } => cmd_stage(&client, action).await,
        Commands::LogLevel { level } => {
            if let Some(level) = level {
                client.set_log_level(level).await?;
                println!("✓ Log level set to {level}");
            } else {
                println!("{}", client.log_level().await?);
            }
            Ok(())
        }
        Commands::Tune { tunable, value } => {
            let tunable = Tunable::from(tunable);
            if let Some(value) = value {
                client.set_tunable(tunable, value).await?;
                println!("✓ {tunable} set to {value}");
            } else {
                println!("{tunable}: {}", client.tunable(tunable).await?);
            }
            Ok(())
        }
        Commands::Recycle { state } => {
            if let Some(state) = state {
                client.set_recycle(state.enabled()).await?;
                println!("✓ Thread recycling {}", on_off(state.enabled()));
            } else {
                println!("Thread recycling {}", on_off(client.recycle().await?));
            }
            Ok(())
        }
        Commands::ForceDown { group, host, state } => {
            client
                .set_force_host_down(&group, &host, state.enabled())
                .await?;
            println!("✓ Forced down {} for {host} in {group}", on_off(state.enabled()));
            Ok(())
        }
        Commands::Reload { config_dir } => {
            if client.reload(config_dir.as_deref()).await? {
                println!("✓ Reload requested");
                Ok(())
            } else {
                anyhow::bail!("Daemon refused to reload")
            }
        }
    }
}

const fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

async fn cmd_status(client: &ControlClient) -> anyhow::Result<()> {
    let work = client.work_queue_info().await?;
    let schedule = client.schedule_queue_info().await?;
    let threads = client.thread_info().await?;

    println!("=== NetCHASM Status ===\n");
    println!("Work queue:      {work}");
    println!("Schedule queue:  {schedule}");
    println!("Threads:         {threads}");
    Ok(())
}

async fn cmd_list(client: &ControlClient, group: Option<&str>) -> anyhow::Result<()> {
    let (names, noun) = match group {
        Some(group) => (client.host_list(group).await?, "host(s)"),
        None => (client.host_group_list().await?, "host group(s)"),
    };

    for name in &names {
        println!("{name}");
    }
    println!("\nTotal: {} {noun}", names.len());
    Ok(())
}

/// Read a host group definition for staging
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid group
pub fn load_host_group(path: &Path) -> anyhow::Result<HostGroupConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let config: HostGroupConfig = ron::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid host group in {}: {e}", path.display()))?;

    if config.group_name.is_empty() {
        anyhow::bail!("Host group in {} has no group_name", path.display());
    }
    Ok(config)
}

async fn cmd_stage(client: &ControlClient, action: StageAction) -> anyhow::Result<()> {
    match action {
        StageAction::Hash => {
            let hash = client.config_hash().await?;
            if hash.is_empty() {
                println!("Nothing staged");
            } else {
                println!("{hash}");
            }
        }
        StageAction::Add { file } => {
            let config = load_host_group(&file)?;
            if client.add_host_group(&config).await? {
                println!("✓ Staged {}", config.group_name);
            } else {
                anyhow::bail!("Daemon rejected host group {}", config.group_name);
            }
        }
        StageAction::Remove { group } => {
            if client.remove_host_group(&group).await? {
                println!("✓ Staged removal of {group}");
            } else {
                anyhow::bail!("Daemon rejected removal of {group}");
            }
        }
        StageAction::Commit => match client.commit_with_fresh_hash().await? {
            outcome @ CommitOutcome::Committed(_) => println!("✓ {outcome}"),
            outcome @ CommitOutcome::NotApplied => println!("{outcome}"),
        },
        StageAction::Clear => {
            if client.clear_transaction().await? {
                println!("✓ Staged changes discarded");
            } else {
                println!("Nothing staged");
            }
        }
    }
    Ok(())
}
