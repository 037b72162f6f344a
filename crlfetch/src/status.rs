//! Per-stage outcomes and the four-key status record.
//!
//! Each pipeline stage returns a [`StageReport`]; the pipeline folds those
//! reports into a [`StatusRecord`] which is only turned into text when the
//! report is rendered.

use std::fmt;

/// Report key for the destination directory.
pub const CRL_PATH_KEY: &str = "CRLPathStatus";
/// Report key for the working directory.
pub const TEMP_PATH_KEY: &str = "TempPathStatus";
/// Report key for the download stage.
pub const DOWNLOAD_KEY: &str = "DownloadStatus";
/// Report key for the extraction stage.
pub const UNZIP_KEY: &str = "UnzipStatus";

/// Whether a directory used by the run is known to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStatus {
    /// Not checked yet, or the check failed.
    #[default]
    Unknown,
    /// The directory exists (pre-existing or just created).
    Good,
}

impl fmt::Display for PathStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStatus::Unknown => write!(f, "Unknown"),
            PathStatus::Good => write!(f, "Good"),
        }
    }
}

/// The fallible pipeline stages tracked in the status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Downloading the archive.
    Download,
    /// Extracting the archive into the destination.
    Unzip,
}

impl Stage {
    /// Report key for this stage.
    pub fn key(&self) -> &'static str {
        match self {
            Stage::Download => DOWNLOAD_KEY,
            Stage::Unzip => UNZIP_KEY,
        }
    }
}

/// Broad classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, DNS or TLS failure.
    Network,
    /// The transfer exceeded its timeout.
    Timeout,
    /// The server answered with a non-success status.
    HttpStatus,
    /// Local file system failure.
    Io,
    /// The archive is missing entries, truncated or not a ZIP file.
    InvalidArchive,
    /// An archive entry would be written outside the destination.
    UnsafeEntry,
}

/// A typed stage failure. Formatted as text only when the report is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of a single stage. Starts as `NotDone` and settles exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageOutcome {
    #[default]
    NotDone,
    Success,
    Failed(StageError),
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::NotDone => write!(f, "Not Done"),
            StageOutcome::Success => write!(f, "Success"),
            StageOutcome::Failed(err) => write!(f, "Error: {}", err),
        }
    }
}

/// A stage paired with the outcome it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

impl StageReport {
    pub fn new(stage: Stage, outcome: StageOutcome) -> Self {
        Self { stage, outcome }
    }
}

/// The four-key status record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusRecord {
    crl_path: PathStatus,
    temp_path: PathStatus,
    download: StageOutcome,
    unzip: StageOutcome,
    paths_settled: bool,
}

impl StatusRecord {
    /// Create a record with every key at its initial value.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crl_path(&self) -> PathStatus {
        self.crl_path
    }

    pub fn temp_path(&self) -> PathStatus {
        self.temp_path
    }

    pub fn download(&self) -> &StageOutcome {
        &self.download
    }

    pub fn unzip(&self) -> &StageOutcome {
        &self.unzip
    }

    /// Record the directory statuses established by the preparer.
    ///
    /// The path statuses are set at most once. Returns `false` (leaving the
    /// record untouched) on a second call.
    pub fn set_paths(&mut self, crl_path: PathStatus, temp_path: PathStatus) -> bool {
        if self.paths_settled {
            tracing::warn!("Ignoring second path status update");
            return false;
        }
        self.crl_path = crl_path;
        self.temp_path = temp_path;
        self.paths_settled = true;
        true
    }

    /// Fold a stage report into the record.
    ///
    /// Only a `NotDone` value can be replaced. Returns `false` (leaving the
    /// record untouched) when the stage has already settled.
    pub fn apply(&mut self, report: StageReport) -> bool {
        let slot = match report.stage {
            Stage::Download => &mut self.download,
            Stage::Unzip => &mut self.unzip,
        };
        if *slot != StageOutcome::NotDone {
            tracing::warn!(key = report.stage.key(), "Ignoring second outcome for settled stage");
            return false;
        }
        *slot = report.outcome;
        true
    }

    /// True when the download or extraction stage failed.
    pub fn has_failures(&self) -> bool {
        self.download.is_failed() || self.unzip.is_failed()
    }

    /// The four status lines in report order.
    pub fn entries(&self) -> [(&'static str, String); 4] {
        [
            (CRL_PATH_KEY, self.crl_path.to_string()),
            (TEMP_PATH_KEY, self.temp_path.to_string()),
            (DOWNLOAD_KEY, self.download.to_string()),
            (UNZIP_KEY, self.unzip.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let record = StatusRecord::new();
        let entries = record.entries();
        assert_eq!(entries[0], (CRL_PATH_KEY, "Unknown".to_string()));
        assert_eq!(entries[1], (TEMP_PATH_KEY, "Unknown".to_string()));
        assert_eq!(entries[2], (DOWNLOAD_KEY, "Not Done".to_string()));
        assert_eq!(entries[3], (UNZIP_KEY, "Not Done".to_string()));
        assert!(!record.has_failures());
    }

    #[test]
    fn test_apply_settles_once() {
        let mut record = StatusRecord::new();
        let error = StageError::new(ErrorKind::Network, "connection refused");

        assert!(record.apply(StageReport::new(
            Stage::Download,
            StageOutcome::Failed(error.clone())
        )));
        assert!(!record.apply(StageReport::new(Stage::Download, StageOutcome::Success)));

        assert_eq!(record.download(), &StageOutcome::Failed(error));
        assert!(record.has_failures());
    }

    #[test]
    fn test_error_renders_with_prefix() {
        let outcome = StageOutcome::Failed(StageError::new(ErrorKind::HttpStatus, "404 Not Found"));
        assert_eq!(outcome.to_string(), "Error: 404 Not Found");
    }

    #[test]
    fn test_set_paths_settles_once() {
        let mut record = StatusRecord::new();
        assert!(record.set_paths(PathStatus::Good, PathStatus::Unknown));
        assert!(!record.set_paths(PathStatus::Good, PathStatus::Good));

        assert_eq!(record.crl_path(), PathStatus::Good);
        assert_eq!(record.temp_path(), PathStatus::Unknown);
    }

    #[test]
    fn test_stage_keys() {
        assert_eq!(Stage::Download.key(), "DownloadStatus");
        assert_eq!(Stage::Unzip.key(), "UnzipStatus");
    }
}
