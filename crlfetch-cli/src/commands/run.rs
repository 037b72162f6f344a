//! Run command - download, extract and report once.

use std::path::{Path, PathBuf};

use clap::Args;
use crlfetch::config::ConfigFile;
use crlfetch::logging::init_logging;
use crlfetch::Pipeline;

use super::load_config;
use crate::error::CliError;

/// Arguments for the run command. Each flag overrides the config file.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// URL of the CRL archive
    #[arg(long, value_name = "URL")]
    pub source_url: Option<String>,

    /// File name of the archive inside the working directory
    #[arg(long, value_name = "NAME")]
    pub archive_name: Option<String>,

    /// Directory the CRLs are extracted into
    #[arg(long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Scratch directory for the downloaded archive
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Route the download through this proxy (credentials may be embedded)
    #[arg(long, value_name = "URL")]
    pub proxy_url: Option<String>,

    /// Write the report to the event log
    #[arg(long, conflicts_with = "no_event_log")]
    pub event_log: bool,

    /// Do not write the report to the event log
    #[arg(long)]
    pub no_event_log: bool,

    /// Email the report
    #[arg(long)]
    pub email: bool,

    /// SMTP relay host
    #[arg(long, value_name = "HOST")]
    pub smtp_server: Option<String>,

    /// SMTP relay port
    #[arg(long, value_name = "PORT")]
    pub smtp_port: Option<u16>,

    /// Report recipient (comma-separated for several)
    #[arg(long, value_name = "ADDRESS")]
    pub email_to: Option<String>,

    /// Report sender
    #[arg(long, value_name = "ADDRESS")]
    pub email_from: Option<String>,

    /// Download timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Also write the diagnostic trace to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl RunArgs {
    /// Apply CLI overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut ConfigFile) {
        if let Some(ref url) = self.source_url {
            config.source.url = url.clone();
        }
        if let Some(ref name) = self.archive_name {
            config.source.archive_name = name.clone();
        }
        if let Some(ref dir) = self.destination {
            config.paths.destination = dir.clone();
        }
        if let Some(ref dir) = self.working_dir {
            config.paths.working = dir.clone();
        }
        if let Some(ref url) = self.proxy_url {
            config.proxy.url = Some(url.clone());
        }
        if self.event_log {
            config.event_log.enabled = true;
        }
        if self.no_event_log {
            config.event_log.enabled = false;
        }
        if self.email {
            config.email.enabled = true;
        }
        if let Some(ref server) = self.smtp_server {
            config.email.smtp_server = server.clone();
        }
        if let Some(port) = self.smtp_port {
            config.email.smtp_port = port;
        }
        if let Some(ref to) = self.email_to {
            config.email.to = to.clone();
        }
        if let Some(ref from) = self.email_from {
            config.email.from = from.clone();
        }
        if let Some(secs) = self.timeout {
            config.timeouts.download_secs = secs;
        }
        if let Some(ref file) = self.log_file {
            config.logging.file = Some(file.clone());
        }
    }
}

/// Run the pipeline once and return the process exit code.
pub fn run(config_path: Option<&Path>, verbose: bool, args: RunArgs) -> Result<i32, CliError> {
    let mut file = load_config(config_path)?;
    args.apply(&mut file);

    let level = if verbose {
        "debug"
    } else {
        file.logging.level.as_str()
    };
    let _guard = init_logging(level, file.logging.file.as_deref())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "crlfetch starting");
    let config = file.resolve()?;

    let outcome = Pipeline::new(config).run();
    println!("{}", outcome.report);

    let exit_code = outcome.exit_code();
    tracing::info!(
        exit_code,
        event_log = %outcome.event_log,
        email = %outcome.email,
        "crlfetch run complete"
    );
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut config = ConfigFile::default();
        let args = RunArgs {
            source_url: Some("http://mirror.example/crl.zip".to_string()),
            destination: Some(PathBuf::from("/srv/crl")),
            proxy_url: Some("http://proxy.local:3128".to_string()),
            no_event_log: true,
            email: true,
            smtp_server: Some("relay.example.com".to_string()),
            email_to: Some("pki@example.com".to_string()),
            email_from: Some("crlfetch@example.com".to_string()),
            timeout: Some(120),
            ..RunArgs::default()
        };

        args.apply(&mut config);

        assert_eq!(config.source.url, "http://mirror.example/crl.zip");
        assert_eq!(config.paths.destination, PathBuf::from("/srv/crl"));
        assert_eq!(config.proxy.url.as_deref(), Some("http://proxy.local:3128"));
        assert!(!config.event_log.enabled);
        assert!(config.email.enabled);
        assert_eq!(config.timeouts.download_secs, 120);
        assert!(config.resolve().is_ok());
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = ConfigFile::default();
        RunArgs::default().apply(&mut config);
        assert_eq!(config, ConfigFile::default());
    }
}
