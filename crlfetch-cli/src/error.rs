//! CLI error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crlfetch::config::ConfigError;
use crlfetch::logging::LoggingError;

/// Errors that abort a CLI command before or outside the pipeline.
#[derive(Debug)]
pub enum CliError {
    /// Loading or validating configuration failed.
    Config(ConfigError),

    /// An explicitly requested config file does not exist.
    ConfigNotFound(PathBuf),

    /// `init` would overwrite an existing file.
    ConfigExists(PathBuf),

    /// The diagnostic trace could not be set up.
    Logging(LoggingError),

    /// Writing command output failed.
    Output(io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::ConfigNotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
            CliError::ConfigExists(path) => write!(
                f,
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            ),
            CliError::Logging(e) => write!(f, "Failed to initialise logging: {}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::ConfigNotFound(_) | CliError::ConfigExists(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Output(e)
    }
}
