//! Archive download.
//!
//! The fetcher picks a [`FetchRoute`] from the configured proxy URL and hands
//! the transfer to an [`ArchiveTransport`]. Any failure is folded into a
//! [`StageReport`] so later stages still run.
//!
//! ```text
//! proxy_url ──► FetchRoute::{Direct, Proxy} ──► ArchiveTransport::download
//!                                                    │
//!                                      StageReport(Download, outcome)
//! ```

mod http;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::status::{ErrorKind, Stage, StageError, StageOutcome, StageReport};

pub use http::HttpTransport;

/// Errors that can occur while downloading the archive.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or protocol failure.
    #[error("failed to download {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The transfer did not complete within the timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with a non-success status.
    #[error("download of {url} failed with HTTP status {status}")]
    Status { url: String, status: u16 },

    /// The proxy URL was rejected by the HTTP client.
    #[error("invalid proxy {proxy}: {reason}")]
    InvalidProxy { proxy: String, reason: String },

    /// Writing the archive to disk failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Classification used in the status record.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport { .. } | FetchError::InvalidProxy { .. } => ErrorKind::Network,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::Status { .. } => ErrorKind::HttpStatus,
            FetchError::Write { .. } => ErrorKind::Io,
        }
    }
}

/// How the transfer reaches the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRoute {
    /// Connect straight to the source, ignoring proxy environment variables.
    Direct,
    /// Tunnel through the given proxy. Credentials in the URL are used as-is.
    Proxy(String),
}

impl FetchRoute {
    /// `Proxy` when a non-empty proxy URL is configured, `Direct` otherwise.
    pub fn from_proxy(proxy_url: Option<&str>) -> Self {
        match proxy_url.map(str::trim) {
            Some(url) if !url.is_empty() => FetchRoute::Proxy(url.to_string()),
            _ => FetchRoute::Direct,
        }
    }
}

/// Downloads a URL to a local file.
pub trait ArchiveTransport {
    /// Download `url` to `dest`, truncating any existing file.
    ///
    /// Returns the number of bytes written.
    fn download(&self, url: &str, route: &FetchRoute, dest: &Path) -> Result<u64, FetchError>;
}

/// Run the download stage.
pub fn fetch(
    transport: &dyn ArchiveTransport,
    url: &str,
    route: &FetchRoute,
    dest: &Path,
) -> StageReport {
    match route {
        FetchRoute::Direct => tracing::info!(url = %url, "Downloading archive"),
        FetchRoute::Proxy(proxy) => {
            tracing::info!(url = %url, proxy = %redact_proxy(proxy), "Downloading archive via proxy")
        }
    }

    let outcome = match transport.download(url, route, dest) {
        Ok(bytes) => {
            tracing::info!(bytes, path = %dest.display(), "Download complete");
            StageOutcome::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "Download failed");
            StageOutcome::Failed(StageError::new(e.kind(), e.to_string()))
        }
    };

    StageReport::new(Stage::Download, outcome)
}

/// Strip userinfo from a proxy URL before it reaches logs or reports.
pub fn redact_proxy(proxy: &str) -> String {
    match reqwest::Url::parse(proxy) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            // Only fails for cannot-be-a-base URLs, which carry no userinfo
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        _ => proxy.to_string(),
    }
}
