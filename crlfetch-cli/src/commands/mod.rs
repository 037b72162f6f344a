//! CLI subcommands.

pub mod config;
pub mod init;
pub mod run;

use std::path::Path;

use crlfetch::config::ConfigFile;

use crate::error::CliError;

/// Load the config file given with `--config`, or the default one.
///
/// An explicit path must exist; the default location may be absent.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) if !path.exists() => Err(CliError::ConfigNotFound(path.to_path_buf())),
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}
