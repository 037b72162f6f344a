//! Init command - write a default configuration file.

use std::path::Path;

use crlfetch::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
pub fn run(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    write_default(&path, force)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize crlfetch settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path.to_path_buf()));
    }
    ConfigFile::default().save_to(path)?;
    Ok(())
}
