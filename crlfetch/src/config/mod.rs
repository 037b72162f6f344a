//! Configuration for a crlfetch run.
//!
//! Settings are layered: built-in defaults, then the INI config file, then CLI
//! overrides applied to [`ConfigFile`]. [`ConfigFile::resolve`] validates the
//! result into an immutable [`RunConfig`] that is fixed for one run.

mod error;
mod file;
mod run;

pub use error::ConfigError;
pub use file::{
    config_file_path, ConfigFile, EmailSettings, EventLogBackend, EventLogSettings,
    LoggingSettings, PathSettings, ProxySettings, SourceSettings, TimeoutSettings,
};
pub use run::{RunConfig, Timeouts};

/// Built-in defaults.
pub mod defaults {
    use std::path::PathBuf;

    /// DISA bundle containing every published CRL.
    pub const SOURCE_URL: &str = "https://crl.gds.disa.mil/getcrlzip?ALL+CRL+ZIP";

    /// File name the archive is downloaded to inside the working directory.
    pub const ARCHIVE_NAME: &str = "ALLCRLZIP.zip";

    /// Web-root subdirectory the CRLs are published from.
    pub const DESTINATION_DIR: &str = "/var/www/html/crl";

    pub const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// The bundle is several hundred megabytes.
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

    pub const SMTP_TIMEOUT_SECS: u64 = 60;

    pub const SMTP_PORT: u16 = 25;

    pub const EVENT_SOURCE: &str = "CRL Download";

    pub const EVENT_ID: u32 = 1000;

    pub const EMAIL_SUBJECT: &str = "CRL Download Report";

    pub const LOG_LEVEL: &str = "info";

    /// Scratch directory for the downloaded archive.
    pub fn working_dir() -> PathBuf {
        std::env::temp_dir().join("crlfetch")
    }

    /// Event log file used by the `file` backend.
    pub fn event_log_file() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("crlfetch")
            .join("events.jsonl")
    }
}
