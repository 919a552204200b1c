//! `chasmctl`: command-line front end for the NetCHASM control socket
//!
//! - [`cli`]: argument parsing
//! - [`settings`]: config file discovery and flag overrides
//! - [`commands`]: one handler per subcommand

pub mod cli;
pub mod commands;
pub mod settings;

pub use cli::Cli;
pub use commands::run;
