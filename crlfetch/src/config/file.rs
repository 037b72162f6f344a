//! INI-backed configuration file.
//!
//! The file is optional. Any section or key that is absent keeps its built-in
//! default, so an empty file and a missing file behave the same.
//!
//! ```ini
//! [source]
//! url = https://crl.gds.disa.mil/getcrlzip?ALL+CRL+ZIP
//! archive_name = ALLCRLZIP.zip
//!
//! [paths]
//! destination = /var/www/html/crl
//! working = /tmp/crlfetch
//!
//! [proxy]
//! url =
//!
//! [event_log]
//! enabled = true
//! backend = syslog
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;

use super::defaults;
use super::error::ConfigError;

/// Where event-log entries are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLogBackend {
    /// The local system log (Unix only).
    Syslog,
    /// A JSON-lines file with a sidecar source registry.
    File,
}

impl Default for EventLogBackend {
    fn default() -> Self {
        if cfg!(unix) {
            EventLogBackend::Syslog
        } else {
            EventLogBackend::File
        }
    }
}

impl fmt::Display for EventLogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLogBackend::Syslog => write!(f, "syslog"),
            EventLogBackend::File => write!(f, "file"),
        }
    }
}

impl FromStr for EventLogBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "syslog" => Ok(EventLogBackend::Syslog),
            "file" => Ok(EventLogBackend::File),
            other => Err(format!("unknown event log backend '{}'", other)),
        }
    }
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub url: String,
    pub archive_name: String,
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSettings {
    pub destination: PathBuf,
    pub working: PathBuf,
}

/// `[proxy]` section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProxySettings {
    /// Proxy URL; `None` or empty means direct transfer.
    pub url: Option<String>,
}

/// `[timeouts]` section, in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutSettings {
    pub connect_secs: u64,
    pub download_secs: u64,
    pub smtp_secs: u64,
}

/// `[event_log]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogSettings {
    pub enabled: bool,
    pub backend: EventLogBackend,
    /// Log file used by the `file` backend.
    pub file: PathBuf,
    /// Source name the entry is registered and written under.
    pub source: String,
    pub event_id: u32,
}

/// `[email]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub to: String,
    pub from: String,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Optional diagnostic log file.
    pub file: Option<PathBuf>,
}

/// The full, editable configuration.
///
/// CLI overrides are applied directly to the public fields before the
/// configuration is resolved into an immutable [`super::RunConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub source: SourceSettings,
    pub paths: PathSettings,
    pub proxy: ProxySettings,
    pub timeouts: TimeoutSettings,
    pub event_log: EventLogSettings,
    pub email: EmailSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            source: SourceSettings {
                url: defaults::SOURCE_URL.to_string(),
                archive_name: defaults::ARCHIVE_NAME.to_string(),
            },
            paths: PathSettings {
                destination: PathBuf::from(defaults::DESTINATION_DIR),
                working: defaults::working_dir(),
            },
            proxy: ProxySettings::default(),
            timeouts: TimeoutSettings {
                connect_secs: defaults::CONNECT_TIMEOUT_SECS,
                download_secs: defaults::DOWNLOAD_TIMEOUT_SECS,
                smtp_secs: defaults::SMTP_TIMEOUT_SECS,
            },
            event_log: EventLogSettings {
                enabled: true,
                backend: EventLogBackend::default(),
                file: defaults::event_log_file(),
                source: defaults::EVENT_SOURCE.to_string(),
                event_id: defaults::EVENT_ID,
            },
            email: EmailSettings {
                enabled: false,
                smtp_server: String::new(),
                smtp_port: defaults::SMTP_PORT,
                to: String::new(),
                from: String::new(),
            },
            logging: LoggingSettings {
                level: defaults::LOG_LEVEL.to_string(),
                file: None,
            },
        }
    }
}

/// Path of the default config file (`<config_dir>/crlfetch/config.ini`).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("crlfetch").join("config.ini"))
        .ok_or(ConfigError::NoConfigDir)
}

impl ConfigFile {
    /// Load the default config file, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path()?)
    }

    /// Load a config file, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = get(ini, "source", "url") {
            config.source.url = v.to_string();
        }
        if let Some(v) = get(ini, "source", "archive_name") {
            config.source.archive_name = v.to_string();
        }

        if let Some(v) = get(ini, "paths", "destination") {
            config.paths.destination = PathBuf::from(v);
        }
        if let Some(v) = get(ini, "paths", "working") {
            config.paths.working = PathBuf::from(v);
        }

        // An empty proxy URL is the same as no proxy
        config.proxy.url = get(ini, "proxy", "url")
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        if let Some(v) = get(ini, "timeouts", "connect_secs") {
            config.timeouts.connect_secs = parse_value("timeouts", "connect_secs", v)?;
        }
        if let Some(v) = get(ini, "timeouts", "download_secs") {
            config.timeouts.download_secs = parse_value("timeouts", "download_secs", v)?;
        }
        if let Some(v) = get(ini, "timeouts", "smtp_secs") {
            config.timeouts.smtp_secs = parse_value("timeouts", "smtp_secs", v)?;
        }

        if let Some(v) = get(ini, "event_log", "enabled") {
            config.event_log.enabled = parse_bool("event_log", "enabled", v)?;
        }
        if let Some(v) = get(ini, "event_log", "backend") {
            config.event_log.backend = parse_value("event_log", "backend", v)?;
        }
        if let Some(v) = get(ini, "event_log", "file") {
            config.event_log.file = PathBuf::from(v);
        }
        if let Some(v) = get(ini, "event_log", "source") {
            config.event_log.source = v.to_string();
        }
        if let Some(v) = get(ini, "event_log", "event_id") {
            config.event_log.event_id = parse_value("event_log", "event_id", v)?;
        }

        if let Some(v) = get(ini, "email", "enabled") {
            config.email.enabled = parse_bool("email", "enabled", v)?;
        }
        if let Some(v) = get(ini, "email", "smtp_server") {
            config.email.smtp_server = v.to_string();
        }
        if let Some(v) = get(ini, "email", "smtp_port") {
            config.email.smtp_port = parse_value("email", "smtp_port", v)?;
        }
        if let Some(v) = get(ini, "email", "to") {
            config.email.to = v.to_string();
        }
        if let Some(v) = get(ini, "email", "from") {
            config.email.from = v.to_string();
        }

        if let Some(v) = get(ini, "logging", "level") {
            config.logging.level = v.to_string();
        }
        config.logging.file = get(ini, "logging", "file")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// Convert to an INI document with every key present.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("source"))
            .set("url", self.source.url.as_str())
            .set("archive_name", self.source.archive_name.as_str());

        ini.with_section(Some("paths"))
            .set("destination", self.paths.destination.to_string_lossy())
            .set("working", self.paths.working.to_string_lossy());

        ini.with_section(Some("proxy"))
            .set("url", self.proxy.url.clone().unwrap_or_default());

        ini.with_section(Some("timeouts"))
            .set("connect_secs", self.timeouts.connect_secs.to_string())
            .set("download_secs", self.timeouts.download_secs.to_string())
            .set("smtp_secs", self.timeouts.smtp_secs.to_string());

        ini.with_section(Some("event_log"))
            .set("enabled", self.event_log.enabled.to_string())
            .set("backend", self.event_log.backend.to_string())
            .set("file", self.event_log.file.to_string_lossy())
            .set("source", self.event_log.source.as_str())
            .set("event_id", self.event_log.event_id.to_string());

        ini.with_section(Some("email"))
            .set("enabled", self.email.enabled.to_string())
            .set("smtp_server", self.email.smtp_server.as_str())
            .set("smtp_port", self.email.smtp_port.to_string())
            .set("to", self.email.to.as_str())
            .set("from", self.email.from.as_str());

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str())
            .set(
                "file",
                self.logging
                    .file
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );

        ini
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.get_from(Some(section), key).map(str::trim)
}

fn parse_value<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: format!("{}.{}", section, key),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: format!("{}.{}", section, key),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
