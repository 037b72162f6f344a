//! Blocking HTTP(S) transport built on reqwest.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Proxy;

use super::{redact_proxy, ArchiveTransport, FetchError, FetchRoute};
use crate::config::Timeouts;

/// HTTP transport for the archive download.
///
/// A client is built per download so the route (direct or proxied) is fixed
/// for the lifetime of the transfer.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    connect_timeout: Duration,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the given connect and total timeouts.
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect_timeout,
            timeout,
        }
    }

    /// Create a transport from the run timeouts.
    pub fn from_timeouts(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.connect, timeouts.download)
    }

    fn client(&self, route: &FetchRoute) -> Result<Client, FetchError> {
        let builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .user_agent(concat!("crlfetch/", env!("CARGO_PKG_VERSION")));

        let builder = match route {
            FetchRoute::Direct => builder.no_proxy(),
            FetchRoute::Proxy(url) => {
                let proxy = Proxy::all(url.as_str()).map_err(|e| FetchError::InvalidProxy {
                    proxy: redact_proxy(url),
                    reason: e.to_string(),
                })?;
                builder.proxy(proxy)
            }
        };

        builder.build().map_err(|e| FetchError::Transport {
            url: String::new(),
            reason: format!("failed to create HTTP client: {}", e),
        })
    }

    fn map_request_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                reason: error_chain(&e),
            }
        }
    }
}

impl ArchiveTransport for HttpTransport {
    fn download(&self, url: &str, route: &FetchRoute, dest: &Path) -> Result<u64, FetchError> {
        let client = self.client(route)?;

        let mut response = client
            .get(url)
            .send()
            .map_err(|e| self.map_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Only create the file once the server has answered with content
        let write_err = |e: io::Error| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        };
        let file = File::create(dest).map_err(write_err)?;
        let mut writer = RecordingWriter::new(BufWriter::new(file));

        let bytes = match response.copy_to(&mut writer) {
            Ok(bytes) => bytes,
            // Body read failures also carry an io::Error, so only the
            // writer's own record marks a local write failure
            Err(e) => {
                return Err(match writer.error.take() {
                    Some(source) => FetchError::Write {
                        path: dest.to_path_buf(),
                        source,
                    },
                    None => self.map_request_error(url, e),
                })
            }
        };

        writer.flush().map_err(write_err)?;
        Ok(bytes)
    }
}

/// Writer that keeps the first error raised by the local file.
struct RecordingWriter<W> {
    inner: W,
    error: Option<io::Error>,
}

impl<W: Write> RecordingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    fn record(&mut self, e: io::Error) -> io::Error {
        if e.kind() == io::ErrorKind::Interrupted {
            return e;
        }
        let forwarded = io::Error::new(e.kind(), e.to_string());
        self.error.get_or_insert(e);
        forwarded
    }
}

impl<W: Write> Write for RecordingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf).map_err(|e| self.record(e))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().map_err(|e| self.record(e))
    }
}

/// Render an error with its source chain, e.g. `error sending request: dns error: ...`.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
