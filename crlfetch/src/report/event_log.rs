//! Local event log sinks.
//!
//! The run report is written as a single informational entry under a named
//! source. Sources must be registered before they are written to;
//! [`ensure_source`] does this once, idempotently.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{EventLogBackend, EventLogSettings};

/// Errors raised by event log sinks.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// Reading or writing the log file failed.
    #[error("event log I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry could not be serialised.
    #[error("failed to encode event log entry: {0}")]
    Encode(#[from] serde_json::Error),

    /// The system log rejected the connection or the message.
    #[error("system log error: {0}")]
    Syslog(String),

    /// An entry was written for a source that was never registered.
    #[error("event source '{0}' is not registered")]
    NotRegistered(String),
}

/// Severity of an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Information,
    Warning,
    Error,
}

/// One event log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEntry<'a> {
    pub source: &'a str,
    pub event_id: u32,
    pub severity: Severity,
    pub message: &'a str,
}

/// A local event log.
pub trait EventLog {
    /// Whether `source` has been registered.
    fn source_exists(&self, source: &str) -> Result<bool, EventLogError>;

    /// Register `source` so entries can be written under it.
    fn register_source(&mut self, source: &str) -> Result<(), EventLogError>;

    /// Write a single entry.
    fn write_entry(&mut self, entry: &EventEntry<'_>) -> Result<(), EventLogError>;
}

/// Register `source` unless it already exists.
///
/// Returns `true` when the source was registered by this call.
pub fn ensure_source(log: &mut dyn EventLog, source: &str) -> Result<bool, EventLogError> {
    if log.source_exists(source)? {
        return Ok(false);
    }
    log.register_source(source)?;
    tracing::info!(source, "Registered event log source");
    Ok(true)
}

/// Open the sink selected by the settings.
pub fn open(settings: &EventLogSettings) -> Box<dyn EventLog> {
    match settings.backend {
        #[cfg(unix)]
        EventLogBackend::Syslog => Box::new(SyslogEventLog::new()),
        #[cfg(not(unix))]
        EventLogBackend::Syslog => {
            tracing::warn!(
                file = %settings.file.display(),
                "System log is not available on this platform, using file event log"
            );
            Box::new(FileEventLog::new(settings.file.clone()))
        }
        EventLogBackend::File => Box::new(FileEventLog::new(settings.file.clone())),
    }
}

/// An entry as stored by [`FileEventLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: String,
    pub source: String,
    pub event_id: u32,
    pub severity: Severity,
    pub message: String,
}

/// JSON-lines event log file.
///
/// Registered sources are kept one per line in a sidecar `<file>.sources`.
#[derive(Debug, Clone)]
pub struct FileEventLog {
    path: PathBuf,
    registry: PathBuf,
}

impl FileEventLog {
    pub fn new(path: PathBuf) -> Self {
        let mut registry = path.clone().into_os_string();
        registry.push(".sources");
        Self {
            path,
            registry: PathBuf::from(registry),
        }
    }

    /// Read every entry from an event log file.
    pub fn read_entries(path: &Path) -> Result<Vec<EventRecord>, EventLogError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(path, e)),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| io_err(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    fn append(path: &Path, line: &str) -> Result<(), EventLogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        writeln!(file, "{}", line).map_err(|e| io_err(path, e))
    }
}

impl EventLog for FileEventLog {
    fn source_exists(&self, source: &str) -> Result<bool, EventLogError> {
        match fs::read_to_string(&self.registry) {
            Ok(text) => Ok(text.lines().any(|line| line == source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&self.registry, e)),
        }
    }

    fn register_source(&mut self, source: &str) -> Result<(), EventLogError> {
        Self::append(&self.registry, source)
    }

    fn write_entry(&mut self, entry: &EventEntry<'_>) -> Result<(), EventLogError> {
        if !self.source_exists(entry.source)? {
            return Err(EventLogError::NotRegistered(entry.source.to_string()));
        }

        let record = EventRecord {
            timestamp: chrono::Local::now().to_rfc3339(),
            source: entry.source.to_string(),
            event_id: entry.event_id,
            severity: entry.severity,
            message: entry.message.to_string(),
        };
        Self::append(&self.path, &serde_json::to_string(&record)?)
    }
}

fn io_err(path: &Path, source: io::Error) -> EventLogError {
    EventLogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
pub use self::syslog_sink::SyslogEventLog;

#[cfg(unix)]
mod syslog_sink {
    use syslog::{Facility, Formatter3164, Logger, LoggerBackend};

    use super::{EventEntry, EventLog, EventLogError, Severity};

    /// Unix system log sink.
    ///
    /// Registering a source opens the connection to the local syslog socket
    /// with the source as the process tag. The event id prefixes the message.
    #[derive(Default)]
    pub struct SyslogEventLog {
        source: Option<String>,
        logger: Option<Logger<LoggerBackend, Formatter3164>>,
    }

    impl SyslogEventLog {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl EventLog for SyslogEventLog {
        fn source_exists(&self, source: &str) -> Result<bool, EventLogError> {
            Ok(self.logger.is_some() && self.source.as_deref() == Some(source))
        }

        fn register_source(&mut self, source: &str) -> Result<(), EventLogError> {
            let formatter = Formatter3164 {
                facility: Facility::LOG_USER,
                hostname: None,
                process: source.to_string(),
                pid: std::process::id(),
            };
            let logger =
                syslog::unix(formatter).map_err(|e| EventLogError::Syslog(e.to_string()))?;
            self.source = Some(source.to_string());
            self.logger = Some(logger);
            Ok(())
        }

        fn write_entry(&mut self, entry: &EventEntry<'_>) -> Result<(), EventLogError> {
            if self.source.as_deref() != Some(entry.source) {
                return Err(EventLogError::NotRegistered(entry.source.to_string()));
            }
            let logger = self
                .logger
                .as_mut()
                .ok_or_else(|| EventLogError::NotRegistered(entry.source.to_string()))?;

            let message = format!("[event {}] {}", entry.event_id, entry.message);
            let result = match entry.severity {
                Severity::Information => logger.info(message),
                Severity::Warning => logger.warning(message),
                Severity::Error => logger.err(message),
            };
            result.map_err(|e| EventLogError::Syslog(e.to_string()))
        }
    }
}
