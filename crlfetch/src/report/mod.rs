//! End-of-run reporting.
//!
//! The reporter runs on every run, whatever the earlier stages did:
//!
//! 1. delete the working archive
//! 2. render the report from the run configuration and status record
//! 3. write it to the event log (when enabled)
//! 4. email it (when enabled)

mod email;
pub mod event_log;

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use crate::config::{EmailSettings, EventLogSettings, RunConfig};
use crate::fetch::redact_proxy;
use crate::prepare::SetupError;
use crate::status::StatusRecord;

pub use email::{EmailMessage, Mailer, NotifyError, SmtpMailer};
pub use event_log::{
    ensure_source, EventEntry, EventLog, EventLogError, EventRecord, FileEventLog, Severity,
};
#[cfg(unix)]
pub use event_log::SyslogEventLog;

/// Title line of every report.
pub const REPORT_TITLE: &str = "CRL download report";

/// Remove the downloaded archive.
///
/// Returns `true` when a file was deleted.
pub fn cleanup(archive: &Path) -> io::Result<bool> {
    match fs::remove_file(archive) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Render the fixed-format report.
pub fn render(config: &RunConfig, status: &StatusRecord, setup_error: Option<&SetupError>) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: &dyn std::fmt::Display| {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{:<18}{}", format!("{}:", label), value);
    };

    let proxy = config
        .proxy_url
        .as_deref()
        .map(redact_proxy)
        .unwrap_or_else(|| "(none)".to_string());

    line("Source URL", &config.source_url);
    line("Archive name", &config.archive_name);
    line("Destination path", &config.destination_dir.display());
    line("Working path", &config.working_dir.display());
    line("Proxy URL", &proxy);
    line(
        "Timeouts",
        &format!(
            "connect {}s, download {}s, smtp {}s",
            config.timeouts.connect.as_secs(),
            config.timeouts.download.as_secs(),
            config.timeouts.smtp.as_secs()
        ),
    );
    line("Event log", &describe_event_log(&config.event_log));
    line("Email", &enabled(config.email.enabled));
    line(
        "SMTP server",
        &format!("{}:{}", config.email.smtp_server, config.email.smtp_port),
    );
    line("Email to", &config.email.to);
    line("Email from", &config.email.from);

    let mut text = format!("{}\n\n{}\n", REPORT_TITLE, out);
    for (key, value) in status.entries() {
        let _ = writeln!(text, "{:<16}{}", format!("{}:", key), value);
    }
    if let Some(err) = setup_error {
        let _ = writeln!(text, "\nSetup failed: {}", err);
    }
    text
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

fn describe_event_log(settings: &EventLogSettings) -> String {
    if settings.enabled {
        format!(
            "enabled ({}, source \"{}\", event {})",
            settings.backend, settings.source, settings.event_id
        )
    } else {
        enabled(false).to_string()
    }
}

/// Register the configured source if needed and write the report.
pub fn write_event(
    log: &mut dyn EventLog,
    settings: &EventLogSettings,
    report: &str,
) -> Result<(), EventLogError> {
    ensure_source(log, &settings.source)?;
    log.write_entry(&EventEntry {
        source: &settings.source,
        event_id: settings.event_id,
        severity: Severity::Information,
        message: report,
    })
}

/// Send the report by email.
pub fn send_email(
    mailer: &dyn Mailer,
    settings: &EmailSettings,
    report: &str,
) -> Result<(), NotifyError> {
    mailer.send(&EmailMessage::report(settings, report))
}
