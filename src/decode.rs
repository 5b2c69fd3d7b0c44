//! Streaming decode of gzip-compressed NDJSON.
//!
//! A stream is checked for gzip magic bytes up front, decompressed, split on
//! `\n` through a large [`BufReader`], and each line is deserialized into the
//! caller's record type. Lines that fail to decode are logged and skipped;
//! framing errors abort the stream.

use crate::error::{Error, Result};
use crate::models::RawRecord;
use flate2::read::MultiGzDecoder;
use serde::de::DeserializeOwned;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};
use tracing::warn;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Per-stream line accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Lines read, blank lines included
    pub lines: u64,
    /// Lines decoded and emitted
    pub records: u64,
    /// Lines that failed to decode
    pub skipped: u64,
}

pub type GzipStream<R> = MultiGzDecoder<Chain<Cursor<[u8; 2]>, R>>;

/// Verifies the gzip magic bytes and wraps `reader` in a decompressor.
pub fn gzip_reader<R: Read>(mut reader: R) -> Result<GzipStream<R>> {
    let mut magic = [0u8; 2];
    if let Err(e) = reader.read_exact(&mut magic) {
        return Err(match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::BadFraming("stream too short for a gzip header".into())
            }
            _ => Error::Io(e),
        });
    }
    if magic != GZIP_MAGIC {
        return Err(Error::BadFraming(format!(
            "missing gzip magic bytes (found {:02x} {:02x})",
            magic[0], magic[1]
        )));
    }
    Ok(MultiGzDecoder::new(Cursor::new(magic).chain(reader)))
}

/// Decompressor failures are framing errors; anything else is plain I/O.
///
/// `UnexpectedEof` counts as framing even when the cause is a body cut short
/// by the server rather than a damaged archive. Both skip the source.
pub(crate) fn read_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::UnexpectedEof => Error::BadFraming(e.to_string()),
        _ => Error::Io(e),
    }
}

pub(crate) fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub(crate) fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Decodes one line into an owned record.
pub fn decode_line<T: DeserializeOwned>(line: &[u8], line_no: u64) -> Result<RawRecord<T>> {
    let value = serde_json::from_slice(line).map_err(|e| Error::Decode {
        line: line_no,
        reason: e.to_string(),
    })?;
    Ok(RawRecord {
        line: line.into(),
        value,
    })
}

/// Decodes every line of a gzip NDJSON stream, handing records to `emit`.
///
/// The last line is processed even without a trailing newline. An error from
/// `emit` stops decoding and is returned as is.
pub fn decode_stream<T, R, F>(reader: R, buffer_size: usize, emit: F) -> Result<DecodeSummary>
where
    T: DeserializeOwned,
    R: Read,
    F: FnMut(RawRecord<T>) -> Result<()>,
{
    let mut summary = DecodeSummary::default();
    decode_stream_into(reader, buffer_size, &mut summary, emit)?;
    Ok(summary)
}

/// [`decode_stream`] that accumulates into `summary`, which keeps the counts
/// of everything processed before an error.
pub fn decode_stream_into<T, R, F>(
    reader: R,
    buffer_size: usize,
    summary: &mut DecodeSummary,
    mut emit: F,
) -> Result<()>
where
    T: DeserializeOwned,
    R: Read,
    F: FnMut(RawRecord<T>) -> Result<()>,
{
    let gz = gzip_reader(reader)?;
    let mut lines = BufReader::with_capacity(buffer_size, gz);
    let mut buf = Vec::with_capacity(4096);

    loop {
        buf.clear();
        let read = lines.read_until(b'\n', &mut buf).map_err(read_error)?;
        if read == 0 {
            break;
        }
        summary.lines += 1;

        let line = trim_line_end(&buf);
        if is_blank(line) {
            continue;
        }

        match decode_line::<T>(line, summary.lines) {
            Ok(record) => {
                emit(record)?;
                summary.records += 1;
            }
            Err(e) => {
                warn!(line = summary.lines, error = %e, "Skipping undecodable line");
                summary.skipped += 1;
            }
        }
    }

    Ok(())
}
