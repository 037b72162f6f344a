//! Archive extraction into the publishing directory.
//!
//! Entries are merged into the destination; a file with the same name is
//! overwritten without prompting. Entries whose names would escape the
//! destination are rejected.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::status::{ErrorKind, Stage, StageError, StageOutcome, StageReport};

/// Errors that can occur during extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive could not be opened.
    #[error("failed to open archive {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive is not a readable ZIP file.
    #[error("invalid archive {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    /// An entry name points outside the destination directory.
    #[error("archive entry '{name}' escapes the destination directory")]
    UnsafeEntry { name: String },

    /// Writing an extracted entry failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    /// Classification used in the status record.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Open { .. } | ExtractError::Write { .. } => ErrorKind::Io,
            ExtractError::Invalid { .. } => ErrorKind::InvalidArchive,
            ExtractError::UnsafeEntry { .. } => ErrorKind::UnsafeEntry,
        }
    }
}

/// Summary of a successful extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Extracts an archive into a directory.
pub trait ArchiveExtractor {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<ExtractSummary, ExtractError>;
}

/// ZIP extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<ExtractSummary, ExtractError> {
        let file = File::open(archive).map_err(|e| ExtractError::Open {
            path: archive.to_path_buf(),
            source: e,
        })?;
        let invalid = |e: ZipError| ExtractError::Invalid {
            path: archive.to_path_buf(),
            source: e,
        };
        let mut zip = ZipArchive::new(BufReader::new(file)).map_err(invalid)?;

        let mut summary = ExtractSummary::default();

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(invalid)?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| ExtractError::UnsafeEntry {
                    name: entry.name().to_string(),
                })?;
            let out_path = dest_dir.join(relative);

            if entry.is_dir() {
                create_dir(&out_path)?;
                summary.directories += 1;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                create_dir(parent)?;
            }

            let write_err = |e: io::Error| ExtractError::Write {
                path: out_path.clone(),
                source: e,
            };
            // File::create truncates, so existing files are replaced
            let mut writer = BufWriter::new(File::create(&out_path).map_err(write_err)?);
            let bytes = io::copy(&mut entry, &mut writer).map_err(|e| {
                // Read failures come from a corrupt entry, not the destination
                if e.kind() == io::ErrorKind::InvalidData {
                    ExtractError::Invalid {
                        path: archive.to_path_buf(),
                        source: ZipError::Io(e),
                    }
                } else {
                    write_err(e)
                }
            })?;
            writer.flush().map_err(write_err)?;

            tracing::trace!(path = %out_path.display(), bytes, "Extracted entry");
            summary.files += 1;
            summary.bytes += bytes;
        }

        Ok(summary)
    }
}

fn create_dir(path: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(path).map_err(|e| ExtractError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Run the extraction stage.
///
/// Success only means extraction raised no error; the number of files
/// written is logged but not checked.
pub fn extract(extractor: &dyn ArchiveExtractor, archive: &Path, dest_dir: &Path) -> StageReport {
    tracing::info!(
        archive = %archive.display(),
        destination = %dest_dir.display(),
        "Extracting archive"
    );

    let outcome = match extractor.extract(archive, dest_dir) {
        Ok(summary) => {
            tracing::info!(
                files = summary.files,
                directories = summary.directories,
                bytes = summary.bytes,
                "Extraction complete"
            );
            StageOutcome::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "Extraction failed");
            StageOutcome::Failed(StageError::new(e.kind(), e.to_string()))
        }
    };

    StageReport::new(Stage::Unzip, outcome)
}
