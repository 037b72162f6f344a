//! The fetch, extract and report pipeline.
//!
//! A [`Pipeline`] owns the run configuration and its collaborators (transport,
//! extractor, event log, mailer). [`Pipeline::run`] executes the stages in
//! order and always reaches the reporter:
//!
//! ```text
//! prepare ─┬─ ok ──► fetch ──► extract ──┐
//!          └─ setup error (fatal) ───────┴──► cleanup ──► render ──► event log ──► email
//! ```

use std::fmt;

use crate::config::RunConfig;
use crate::extract::{self, ArchiveExtractor, ZipExtractor};
use crate::fetch::{self, ArchiveTransport, FetchRoute, HttpTransport};
use crate::prepare::{self, SetupError};
use crate::report::{self, event_log, EventLog, Mailer, SmtpMailer};
use crate::status::StatusRecord;

/// Successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Download, extraction or event log write failed.
pub const EXIT_PARTIAL_FAILURE: i32 = 1;
/// Configuration or environment setup failed.
pub const EXIT_FATAL: i32 = 2;

/// Result of delivering the report through one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The channel is turned off in the configuration.
    Disabled,
    Delivered,
    Failed(String),
}

impl Delivery {
    pub fn is_failed(&self) -> bool {
        matches!(self, Delivery::Failed(_))
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Disabled => write!(f, "disabled"),
            Delivery::Delivered => write!(f, "delivered"),
            Delivery::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub status: StatusRecord,
    /// The rendered report text.
    pub report: String,
    pub event_log: Delivery,
    pub email: Delivery,
    /// Set when environment preparation failed and the stages were skipped.
    pub setup_error: Option<SetupError>,
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.setup_error.is_some() {
            EXIT_FATAL
        } else if self.status.has_failures() || self.event_log.is_failed() {
            EXIT_PARTIAL_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

/// A single run of the pipeline.
pub struct Pipeline {
    config: RunConfig,
    transport: Box<dyn ArchiveTransport>,
    extractor: Box<dyn ArchiveExtractor>,
    event_log: Option<Box<dyn EventLog>>,
    mailer: Option<Box<dyn Mailer>>,
}

impl Pipeline {
    /// Create a pipeline with the default collaborators for `config`.
    ///
    /// The event log and mailer are only created when enabled.
    pub fn new(config: RunConfig) -> Self {
        let transport = Box::new(HttpTransport::from_timeouts(&config.timeouts));
        let event_log = config
            .event_log
            .enabled
            .then(|| event_log::open(&config.event_log));
        let mailer = config.email.enabled.then(|| {
            Box::new(SmtpMailer::from_settings(&config.email, config.timeouts.smtp))
                as Box<dyn Mailer>
        });

        Self {
            config,
            transport,
            extractor: Box::new(ZipExtractor::new()),
            event_log,
            mailer,
        }
    }

    /// Replace the download transport.
    pub fn with_transport(mut self, transport: impl ArchiveTransport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    /// Replace the archive extractor.
    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Replace the event log sink. Only used when the event log is enabled.
    pub fn with_event_log(mut self, log: impl EventLog + 'static) -> Self {
        self.event_log = Some(Box::new(log));
        self
    }

    /// Replace the mailer. Only used when email is enabled.
    pub fn with_mailer(mut self, mailer: impl Mailer + 'static) -> Self {
        self.mailer = Some(Box::new(mailer));
        self
    }

    /// Execute every stage and report the result.
    pub fn run(mut self) -> RunOutcome {
        let config = &self.config;
        let archive = config.archive_path();
        let mut status = StatusRecord::new();

        let setup_error = match prepare::prepare(
            &config.destination_dir,
            &config.working_dir,
            &config.archive_name,
        ) {
            Ok(prepared) => {
                status.set_paths(prepared.crl_path, prepared.temp_path);
                None
            }
            Err(failure) => {
                tracing::error!(error = %failure.error, "Environment setup failed, skipping download");
                status.set_paths(failure.crl_path, failure.temp_path);
                Some(failure.error)
            }
        };

        if setup_error.is_none() {
            let route = FetchRoute::from_proxy(config.proxy_url.as_deref());
            status.apply(fetch::fetch(
                self.transport.as_ref(),
                &config.source_url,
                &route,
                &archive,
            ));
            status.apply(extract::extract(
                self.extractor.as_ref(),
                &archive,
                &config.destination_dir,
            ));
        }

        match report::cleanup(&archive) {
            Ok(true) => tracing::debug!(path = %archive.display(), "Removed working archive"),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %archive.display(), error = %e, "Failed to remove working archive")
            }
        }

        let text = report::render(config, &status, setup_error.as_ref());
        tracing::debug!(report = %text, "Rendered report");

        let event_log = if !config.event_log.enabled {
            Delivery::Disabled
        } else if let Some(log) = self.event_log.as_mut() {
            match report::write_event(log.as_mut(), &config.event_log, &text) {
                Ok(()) => {
                    tracing::info!(
                        source = %config.event_log.source,
                        event_id = config.event_log.event_id,
                        "Wrote report to event log"
                    );
                    Delivery::Delivered
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to write event log entry");
                    Delivery::Failed(e.to_string())
                }
            }
        } else {
            Delivery::Disabled
        };

        let email = if !config.email.enabled {
            Delivery::Disabled
        } else if let Some(mailer) = self.mailer.as_deref() {
            match report::send_email(mailer, &config.email, &text) {
                Ok(()) => {
                    tracing::info!(to = %config.email.to, "Sent report email");
                    Delivery::Delivered
                }
                Err(e) => {
                    // Email delivery problems only reach the diagnostic trace
                    tracing::warn!(error = %e, "Failed to send report email");
                    Delivery::Failed(e.to_string())
                }
            }
        } else {
            Delivery::Disabled
        };

        RunOutcome {
            status,
            report: text,
            event_log,
            email,
            setup_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use tempfile::TempDir;

    use crate::config::{ConfigFile, EventLogBackend};
    use crate::extract::{ExtractError, ExtractSummary};
    use crate::fetch::FetchError;
    use crate::report::{EmailMessage, EventEntry, EventLogError, NotifyError};
    use crate::status::{PathStatus, StageOutcome};

    #[derive(Clone, Default)]
    struct Calls {
        routes: Rc<RefCell<Vec<FetchRoute>>>,
        extracted: Rc<RefCell<Vec<PathBuf>>>,
        entries: Rc<RefCell<Vec<(String, u32, String)>>>,
        emails: Rc<RefCell<Vec<EmailMessage>>>,
    }

    struct MockTransport {
        calls: Calls,
        fail: bool,
    }

    impl ArchiveTransport for MockTransport {
        fn download(&self, url: &str, route: &FetchRoute, dest: &Path) -> Result<u64, FetchError> {
            self.calls.routes.borrow_mut().push(route.clone());
            if self.fail {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: "dns error: no such host".to_string(),
                });
            }
            fs::write(dest, b"zip").unwrap();
            Ok(3)
        }
    }

    struct MockExtractor {
        calls: Calls,
    }

    impl ArchiveExtractor for MockExtractor {
        fn extract(&self, archive: &Path, _dest: &Path) -> Result<ExtractSummary, ExtractError> {
            self.calls.extracted.borrow_mut().push(archive.to_path_buf());
            if !archive.exists() {
                return Err(ExtractError::Open {
                    path: archive.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            Ok(ExtractSummary::default())
        }
    }

    struct MemoryEventLog {
        calls: Calls,
        registered: bool,
        fail_writes: bool,
    }

    impl EventLog for MemoryEventLog {
        fn source_exists(&self, _source: &str) -> Result<bool, EventLogError> {
            Ok(self.registered)
        }

        fn register_source(&mut self, _source: &str) -> Result<(), EventLogError> {
            self.registered = true;
            Ok(())
        }

        fn write_entry(&mut self, entry: &EventEntry<'_>) -> Result<(), EventLogError> {
            if self.fail_writes {
                return Err(EventLogError::Syslog("socket closed".to_string()));
            }
            self.calls.entries.borrow_mut().push((
                entry.source.to_string(),
                entry.event_id,
                entry.message.to_string(),
            ));
            Ok(())
        }
    }

    struct MockMailer {
        calls: Calls,
        fail: bool,
    }

    impl Mailer for MockMailer {
        fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Send {
                    server: "relay.example.com:25".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            self.calls.emails.borrow_mut().push(message.clone());
            Ok(())
        }
    }

    fn config_in(temp: &TempDir) -> ConfigFile {
        let mut file = ConfigFile::default();
        file.paths.destination = temp.path().join("www").join("crl");
        file.paths.working = temp.path().join("work");
        file.event_log.backend = EventLogBackend::File;
        file.event_log.file = temp.path().join("events.jsonl");
        file
    }

    fn pipeline(file: &ConfigFile, calls: &Calls, fail_download: bool) -> Pipeline {
        Pipeline::new(file.resolve().unwrap())
            .with_transport(MockTransport {
                calls: calls.clone(),
                fail: fail_download,
            })
            .with_extractor(MockExtractor {
                calls: calls.clone(),
            })
            .with_event_log(MemoryEventLog {
                calls: calls.clone(),
                registered: false,
                fail_writes: false,
            })
    }

    #[test]
    fn test_successful_run() {
        let temp = TempDir::new().unwrap();
        let calls = Calls::default();

        let outcome = pipeline(&config_in(&temp), &calls, false).run();

        assert_eq!(outcome.status.crl_path(), PathStatus::Good);
        assert_eq!(outcome.status.temp_path(), PathStatus::Good);
        assert_eq!(outcome.status.download(), &StageOutcome::Success);
        assert_eq!(outcome.status.unzip(), &StageOutcome::Success);
        assert_eq!(outcome.event_log, Delivery::Delivered);
        assert_eq!(outcome.email, Delivery::Disabled);
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);

        let entries = calls.entries.borrow();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "CRL Download");
        assert_eq!(entries[0].1, 1000);
        assert_eq!(entries[0].2, outcome.report);
        assert!(calls.emails.borrow().is_empty());
    }

    #[test]
    fn test_empty_proxy_takes_direct_route() {
        let temp = TempDir::new().unwrap();
        let mut file = config_in(&temp);
        file.proxy.url = Some(String::new());
        let calls = Calls::default();

        pipeline(&file, &calls, false).run();

        assert_eq!(calls.routes.borrow().as_slice(), &[FetchRoute::Direct]);
    }

    #[test]
    fn test_configured_proxy_takes_proxy_route() {
        let temp = TempDir::new().unwrap();
        let mut file = config_in(&temp);
        file.proxy.url = Some("http://proxy.local:3128".to_string());
        let calls = Calls::default();

        pipeline(&file, &calls, false).run();

        assert_eq!(
            calls.routes.borrow().as_slice(),
            &[FetchRoute::Proxy("http://proxy.local:3128".to_string())]
        );
    }

    #[test]
    fn test_download_failure_still_extracts_and_reports() {
        let temp = TempDir::new().unwrap();
        let calls = Calls::default();

        let outcome = pipeline(&config_in(&temp), &calls, true).run();

        assert!(outcome.status.download().is_failed());
        assert!(outcome.status.unzip().is_failed());
        assert_eq!(calls.extracted.borrow().len(), 1);
        assert_eq!(calls.entries.borrow().len(), 1);
        assert!(outcome
            .report
            .contains("DownloadStatus: Error: failed to download"));
        assert_eq!(outcome.exit_code(), EXIT_PARTIAL_FAILURE);
    }

    #[test]
    fn test_working_archive_removed_after_run() {
        let temp = TempDir::new().unwrap();
        let file = config_in(&temp);
        let calls = Calls::default();

        pipeline(&file, &calls, false).run();

        assert!(!file.paths.working.join("ALLCRLZIP.zip").exists());
        assert!(file.paths.working.is_dir());
    }

    #[test]
    fn test_setup_failure_is_fatal_but_reported() {
        let temp = TempDir::new().unwrap();
        let file = config_in(&temp);
        fs::create_dir_all(file.paths.destination.parent().unwrap()).unwrap();
        fs::write(&file.paths.destination, b"in the way").unwrap();
        let calls = Calls::default();

        let outcome = pipeline(&file, &calls, false).run();

        assert!(outcome.setup_error.is_some());
        assert_eq!(outcome.status.crl_path(), PathStatus::Unknown);
        assert_eq!(outcome.status.download(), &StageOutcome::NotDone);
        assert_eq!(outcome.status.unzip(), &StageOutcome::NotDone);
        assert!(calls.routes.borrow().is_empty());
        assert_eq!(calls.entries.borrow().len(), 1);
        assert!(outcome.report.contains("Setup failed:"));
        assert_eq!(outcome.exit_code(), EXIT_FATAL);
    }

    #[test]
    fn test_disabled_event_log_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut file = config_in(&temp);
        file.event_log.enabled = false;
        let calls = Calls::default();

        let outcome = pipeline(&file, &calls, false).run();

        assert_eq!(outcome.event_log, Delivery::Disabled);
        assert!(calls.entries.borrow().is_empty());
    }

    #[test]
    fn test_event_log_failure_is_partial_failure() {
        let temp = TempDir::new().unwrap();
        let calls = Calls::default();

        let outcome = pipeline(&config_in(&temp), &calls, false)
            .with_event_log(MemoryEventLog {
                calls: calls.clone(),
                registered: true,
                fail_writes: true,
            })
            .run();

        assert!(outcome.event_log.is_failed());
        assert_eq!(outcome.exit_code(), EXIT_PARTIAL_FAILURE);
    }

    fn email_config(temp: &TempDir) -> ConfigFile {
        let mut file = config_in(temp);
        file.email.enabled = true;
        file.email.smtp_server = "relay.example.com".to_string();
        file.email.to = "pki@example.com".to_string();
        file.email.from = "crlfetch@example.com".to_string();
        file
    }

    #[test]
    fn test_email_sent_when_enabled() {
        let temp = TempDir::new().unwrap();
        let calls = Calls::default();

        let outcome = pipeline(&email_config(&temp), &calls, false)
            .with_mailer(MockMailer {
                calls: calls.clone(),
                fail: false,
            })
            .run();

        assert_eq!(outcome.email, Delivery::Delivered);
        let emails = calls.emails.borrow();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "CRL Download Report");
        assert_eq!(emails[0].to, vec!["pki@example.com"]);
        assert_eq!(emails[0].body, outcome.report);
    }

    #[test]
    fn test_email_failure_does_not_change_exit_code() {
        let temp = TempDir::new().unwrap();
        let calls = Calls::default();

        let outcome = pipeline(&email_config(&temp), &calls, false)
            .with_mailer(MockMailer {
                calls: calls.clone(),
                fail: true,
            })
            .run();

        assert!(outcome.email.is_failed());
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
    }
}
