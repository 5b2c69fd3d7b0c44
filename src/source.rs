//! Source providers: turn a source identifier into an open byte stream.
//!
//! Two providers exist, selected by [`SourceKind`]:
//!
//! - [`FileSource`] -- local paths, length from filesystem metadata
//! - [`HttpSource`] -- HTTP GET under a whole-request deadline
//!
//! Neither provider retries. A failed source is reported to the caller, which
//! logs it and moves on.

use crate::config::{PipelineConfig, BAD_STATUS_BODY_LIMIT};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// An opened source stream and its declared length in bytes.
///
/// `length` is 0 when the source does not declare one. Dropping `reader`
/// releases the underlying file or connection.
pub struct OpenedSource {
    pub reader: Box<dyn Read + Send>,
    pub length: u64,
}

/// Opens source identifiers. Shared by every worker of a pipeline run.
pub trait SourceProvider: Send + Sync {
    fn open(&self, id: &str) -> Result<OpenedSource>;
}

/// Source type selector accepted by the invocation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Http,
}

impl SourceKind {
    /// Builds the provider for this kind from the run configuration.
    pub fn provider(&self, config: &PipelineConfig) -> Result<Box<dyn SourceProvider>> {
        match self {
            SourceKind::File => Ok(Box::new(FileSource)),
            SourceKind::Http => Ok(Box::new(HttpSource::new(config.http_timeout)?)),
        }
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(SourceKind::File),
            "http" => Ok(SourceKind::Http),
            other => Err(Error::UnknownSourceKind(other.to_string())),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::File => f.write_str("file"),
            SourceKind::Http => f.write_str("http"),
        }
    }
}

/// Local file provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl SourceProvider for FileSource {
    fn open(&self, id: &str) -> Result<OpenedSource> {
        let unavailable = |e: io::Error| Error::SourceUnavailable {
            source_id: id.to_string(),
            reason: e.to_string(),
        };
        let file = File::open(id).map_err(unavailable)?;
        let length = file.metadata().map_err(unavailable)?.len();
        Ok(OpenedSource {
            reader: Box::new(file),
            length,
        })
    }
}

/// HTTP provider backed by a blocking client.
///
/// The client timeout covers connecting, headers and the full body read. The
/// returned reader owns the response; dropping it closes the connection and
/// discards the pending deadline.
pub struct HttpSource {
    client: Client,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("collab-graph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, id: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                source_id: id.to_string(),
                seconds: self.timeout.as_secs_f64(),
            }
        } else {
            Error::SourceUnavailable {
                source_id: id.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Response body whose deadline expiry reads as [`io::ErrorKind::TimedOut`].
///
/// The blocking client reports a body-phase timeout as an `Other` error
/// wrapping a `reqwest::Error`.
struct DeadlineBody {
    response: reqwest::blocking::Response,
}

impl Read for DeadlineBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.response.read(buf).map_err(timed_out_as_kind)
    }
}

fn timed_out_as_kind(err: io::Error) -> io::Error {
    if err.kind() == io::ErrorKind::TimedOut {
        return err;
    }
    let mut cause: Option<&(dyn std::error::Error + 'static)> = err
        .get_ref()
        .map(|inner| inner as &(dyn std::error::Error + 'static));
    while let Some(current) = cause {
        if current
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_timeout)
        {
            return io::Error::new(io::ErrorKind::TimedOut, err.to_string());
        }
        cause = current.source();
    }
    err
}

impl SourceProvider for HttpSource {
    fn open(&self, id: &str) -> Result<OpenedSource> {
        let response = self
            .client
            .get(id)
            .send()
            .map_err(|e| self.classify(id, e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = Vec::new();
            // Diagnostics only; a failed body read leaves whatever arrived.
            let _ = response
                .take(BAD_STATUS_BODY_LIMIT as u64)
                .read_to_end(&mut body);
            return Err(Error::BadStatus {
                source_id: id.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let length = match response.content_length() {
            Some(length) => length,
            None => {
                debug!(source = id, "Response has no usable Content-Length");
                0
            }
        };

        Ok(OpenedSource {
            reader: Box::new(DeadlineBody { response }),
            length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parse_source_kinds() {
        assert_eq!("file".parse::<SourceKind>().unwrap(), SourceKind::File);
        assert_eq!("http".parse::<SourceKind>().unwrap(), SourceKind::Http);
    }

    #[test]
    fn unknown_source_kind_rejected() {
        let err = "ftp".parse::<SourceKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownSourceKind(ref s) if s == "ftp"));
    }

    #[test]
    fn source_kind_display_roundtrips() {
        for kind in [SourceKind::File, SourceKind::Http] {
            assert_eq!(kind.to_string().parse::<SourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn file_source_reports_length() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        tmp.flush().unwrap();

        let mut opened = FileSource.open(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(opened.length, 10);

        let mut content = String::new();
        opened.reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "0123456789");
    }

    #[test]
    fn file_source_missing_path_is_unavailable() {
        let result = FileSource.open("/nonexistent/archive.json.gz");
        match result {
            Err(Error::SourceUnavailable { source_id, .. }) => {
                assert_eq!(source_id, "/nonexistent/archive.json.gz")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing file opened"),
        }
    }

    #[test]
    fn timed_out_kind_passes_through() {
        let err = timed_out_as_kind(io::Error::new(io::ErrorKind::TimedOut, "deadline"));
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn unrelated_errors_keep_their_kind() {
        let err = timed_out_as_kind(io::Error::new(io::ErrorKind::Other, "reset"));
        assert_eq!(err.kind(), io::ErrorKind::Other);

        let err = timed_out_as_kind(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn file_kind_builds_provider() {
        let provider = SourceKind::File
            .provider(&PipelineConfig::default())
            .unwrap();
        assert!(provider.open("/nonexistent").is_err());
    }
}
