//! Configuration inspection commands.

use std::io;
use std::path::Path;

use clap::Subcommand;
use crlfetch::config::config_file_path;

use super::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration (file values over defaults)
    Show,
}

/// Run a config subcommand.
pub fn run(config_path: Option<&Path>, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => config_file_path()?,
            };
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            // Validate so problems surface here rather than at run time
            config.resolve()?;
            config.to_ini().write_to(&mut io::stdout())?;
            Ok(())
        }
    }
}
