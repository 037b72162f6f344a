//! Configuration error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, saving or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read or parsed.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// The config file could not be written.
    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A value could not be parsed into the expected type.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A URL setting is not an http(s) URL.
    #[error("invalid URL '{value}' for {key}: {reason}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The archive file name is empty or contains path separators.
    #[error("invalid archive name '{0}': must be a plain file name")]
    InvalidArchiveName(String),

    /// Email is enabled but required settings are empty.
    #[error("email notification is enabled but {} not set", .0.join(", "))]
    MissingEmailSettings(Vec<&'static str>),

    /// No platform config directory could be determined.
    #[error("could not determine the configuration directory")]
    NoConfigDir,
}
