//! Resolved, validated run configuration.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use super::error::ConfigError;
use super::file::{ConfigFile, EmailSettings, EventLogSettings};

/// Timeouts applied to the blocking network calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub download: Duration,
    pub smtp: Duration,
}

/// Immutable configuration for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub source_url: String,
    pub archive_name: String,
    pub destination_dir: PathBuf,
    pub working_dir: PathBuf,
    pub proxy_url: Option<String>,
    pub timeouts: Timeouts,
    pub event_log: EventLogSettings,
    pub email: EmailSettings,
}

impl RunConfig {
    /// Fixed location of the downloaded archive.
    pub fn archive_path(&self) -> PathBuf {
        self.working_dir.join(&self.archive_name)
    }
}

impl ConfigFile {
    /// Validate the layered settings into a [`RunConfig`].
    pub fn resolve(&self) -> Result<RunConfig, ConfigError> {
        validate_url("source.url", &self.source.url)?;

        let archive_name = self.source.archive_name.trim();
        if archive_name.is_empty()
            || archive_name.contains(['/', '\\'])
            || archive_name == "."
            || archive_name == ".."
        {
            return Err(ConfigError::InvalidArchiveName(
                self.source.archive_name.clone(),
            ));
        }

        let proxy_url = self
            .proxy
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        if let Some(ref url) = proxy_url {
            validate_url("proxy.url", url)?;
        }

        for (key, secs) in [
            ("timeouts.connect_secs", self.timeouts.connect_secs),
            ("timeouts.download_secs", self.timeouts.download_secs),
            ("timeouts.smtp_secs", self.timeouts.smtp_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                    reason: "timeout must be at least one second".to_string(),
                });
            }
        }

        if self.email.enabled {
            let missing: Vec<&'static str> = [
                ("email.smtp_server", &self.email.smtp_server),
                ("email.to", &self.email.to),
                ("email.from", &self.email.from),
            ]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect();

            if !missing.is_empty() {
                return Err(ConfigError::MissingEmailSettings(missing));
            }
        }

        Ok(RunConfig {
            source_url: self.source.url.trim().to_string(),
            archive_name: archive_name.to_string(),
            destination_dir: self.paths.destination.clone(),
            working_dir: self.paths.working.clone(),
            proxy_url,
            timeouts: Timeouts {
                connect: Duration::from_secs(self.timeouts.connect_secs),
                download: Duration::from_secs(self.timeouts.download_secs),
                smtp: Duration::from_secs(self.timeouts.smtp_secs),
            },
            event_log: self.event_log.clone(),
            email: self.email.clone(),
        })
    }
}

fn validate_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        key,
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
