//! Pre-flight check that a gzip source really holds NDJSON.
//!
//! Only the first non-empty lines are sampled. The check never runs inside the
//! ingestion pipeline.

use crate::config::{READ_BUFFER_SIZE, VALIDATION_SAMPLE_LINES, VALIDITY_THRESHOLD};
use crate::decode::{gzip_reader, is_blank, read_error, trim_line_end};
use crate::error::Result;
use serde_json::{Map, Value};
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationReport {
    /// Non-empty lines examined
    pub sampled: u64,
    /// Sampled lines that parsed as a JSON object
    pub valid: u64,
    pub ratio: f64,
    pub is_ndjson: bool,
}

impl ValidationReport {
    fn from_counts(sampled: u64, valid: u64) -> Self {
        let ratio = if sampled == 0 {
            0.0
        } else {
            valid as f64 / sampled as f64
        };
        Self {
            sampled,
            valid,
            ratio,
            is_ndjson: valid > 0 && ratio > VALIDITY_THRESHOLD,
        }
    }
}

/// Samples up to `sample_lines` non-empty lines of a gzip stream.
///
/// Fails only when the stream is not gzip or the decompressor breaks; badly
/// formed lines just lower the ratio.
pub fn validate_ndjson<R: Read>(reader: R, sample_lines: usize) -> Result<ValidationReport> {
    let gz = gzip_reader(reader)?;
    let mut lines = BufReader::with_capacity(READ_BUFFER_SIZE, gz);
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    let mut sampled = 0u64;
    let mut valid = 0u64;

    while sampled < sample_lines as u64 {
        buf.clear();
        if lines.read_until(b'\n', &mut buf).map_err(read_error)? == 0 {
            break;
        }
        line_no += 1;

        let line = trim_line_end(&buf);
        if is_blank(line) {
            continue;
        }
        sampled += 1;

        match serde_json::from_slice::<Map<String, Value>>(line) {
            Ok(_) => valid += 1,
            Err(e) => debug!(line = line_no, error = %e, "Line is not a JSON object"),
        }
    }

    let report = ValidationReport::from_counts(sampled, valid);
    info!(
        sampled = report.sampled,
        valid = report.valid,
        ratio = report.ratio,
        is_ndjson = report.is_ndjson,
        "Validation complete"
    );
    Ok(report)
}

/// [`validate_ndjson`] with the default sample size.
pub fn validate_source<R: Read>(reader: R) -> Result<ValidationReport> {
    validate_ndjson(reader, VALIDATION_SAMPLE_LINES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn objects(n: usize) -> String {
        (0..n).map(|i| format!("{{\"n\":{i}}}\n")).collect()
    }

    #[test]
    fn all_objects_is_ndjson() {
        let report = validate_source(&gzip(&objects(50))[..]).unwrap();
        assert_eq!(report.sampled, 50);
        assert_eq!(report.valid, 50);
        assert!(report.is_ndjson);
    }

    #[test]
    fn ratio_must_exceed_threshold() {
        // 95 of 100 is not strictly above 0.95
        let mut text = objects(95);
        text.push_str(&"garbage\n".repeat(5));
        let report = validate_source(&gzip(&text)[..]).unwrap();
        assert_eq!(report.valid, 95);
        assert!(!report.is_ndjson);

        let mut text = objects(96);
        text.push_str(&"[1,2]\n".repeat(4));
        let report = validate_source(&gzip(&text)[..]).unwrap();
        assert!(report.is_ndjson);
    }

    #[test]
    fn json_arrays_and_scalars_do_not_count() {
        let report = validate_source(&gzip("[1]\n\"x\"\n42\n")[..]).unwrap();
        assert_eq!(report.sampled, 3);
        assert_eq!(report.valid, 0);
        assert!(!report.is_ndjson);
    }

    #[test]
    fn sample_stops_at_limit() {
        let mut text = objects(10);
        text.push_str(&"garbage\n".repeat(10));
        let report = validate_ndjson(&gzip(&text)[..], 10).unwrap();
        assert_eq!(report.sampled, 10);
        assert!(report.is_ndjson);
    }

    #[test]
    fn blank_lines_are_not_sampled() {
        let report = validate_source(&gzip("\n{\"a\":1}\n\n  \n{\"b\":2}")[..]).unwrap();
        assert_eq!(report.sampled, 2);
        assert_eq!(report.valid, 2);
        assert!(report.is_ndjson);
    }

    #[test]
    fn empty_archive_is_not_ndjson() {
        let report = validate_source(&gzip("")[..]).unwrap();
        assert_eq!(report.sampled, 0);
        assert_eq!(report.ratio, 0.0);
        assert!(!report.is_ndjson);
    }

    #[test]
    fn plain_text_is_bad_framing() {
        let result = validate_source(&b"{\"a\":1}\n"[..]);
        assert!(matches!(result, Err(Error::BadFraming(_))));
    }
}
