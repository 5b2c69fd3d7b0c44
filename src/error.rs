//! Error types for ingestion, graph algorithms and graph codecs.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the library.
///
/// Per-source failures (`SourceUnavailable`, `Timeout`, `BadStatus`, `BadFraming`)
/// and per-line `Decode` failures are recovered inside the pipeline; only setup
/// errors and codec truncation reach the caller of a pipeline run.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source could not be opened or fetched.
    #[error("source unavailable: {source_id}: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    /// A network fetch exceeded its deadline.
    #[error("timed out after {seconds:.1}s fetching {source_id}")]
    Timeout { source_id: String, seconds: f64 },

    /// A network fetch returned a non-success status.
    #[error("bad status {status} from {source_id}\nBody:\n{body}")]
    BadStatus {
        source_id: String,
        status: u16,
        body: String,
    },

    /// The stream is not valid gzip.
    #[error("bad gzip framing: {0}")]
    BadFraming(String),

    /// A single line could not be decoded.
    #[error("line {line}: {reason}")]
    Decode { line: u64, reason: String },

    /// A binary graph stream ended in the middle of a record.
    #[error("truncated graph stream at byte {offset}: {reason}")]
    Truncated { offset: u64, reason: String },

    /// Source type selector is neither `file` nor `http`.
    #[error("unknown source type: {0} (expected \"file\" or \"http\")")]
    UnknownSourceKind(String),

    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The aggregator stopped receiving before the source was drained.
    #[error("record channel closed")]
    ChannelClosed,
}

impl Error {
    /// True for failures that skip one source without affecting the run.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            Error::SourceUnavailable { .. }
                | Error::Timeout { .. }
                | Error::BadStatus { .. }
                | Error::BadFraming(_)
        )
    }
}
