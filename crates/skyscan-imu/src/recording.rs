use crate::types::{SensorSample, Vector3};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Number of comma-separated fields in a sample line: kind, timestamp, x, y, z.
const FIELD_COUNT: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum RecordingError {
    #[error("line {line}: expected 5 fields, found {found}")]
    FieldCount { line: usize, found: usize },
    #[error("line {line}: unknown sensor kind `{kind}`")]
    UnknownKind { line: usize, kind: String },
    #[error("line {line}: `{value}` is not a number")]
    InvalidNumber { line: usize, value: String },
    #[error("line {line}: timestamp {value} is negative or not finite")]
    InvalidTimestamp { line: usize, value: f64 },
    #[error("line {line}: not valid UTF-8")]
    Encoding { line: usize },
    #[error("line {line}: {message}")]
    Csv { line: usize, message: String },
}

/// One line as laid out on disk.
#[derive(Debug, Deserialize)]
struct RawSample {
    kind: String,
    seconds: f64,
    x: f64,
    y: f64,
    z: f64,
}

/// Streaming parser for recorded sensor logs.
///
/// Each line is `<kind>,<seconds>,<x>,<y>,<z>` with kind `g` (gyro), `a`
/// (accelerometer) or `m` (magnetometer). Blank lines and `#` comments are
/// skipped. Feed raw bytes via `push_data`, then drain samples via
/// `next_sample`; a trailing line without a newline is held back until more
/// data arrives or `finish` is called.
pub struct RecordingParser {
    buffer: VecDeque<u8>,
    line: usize,
    finished: bool,
    csv: csv::ReaderBuilder,
}

impl RecordingParser {
    pub fn new() -> Self {
        let mut csv = csv::ReaderBuilder::new();
        csv.has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(true);
        Self {
            buffer: VecDeque::with_capacity(8192),
            line: 0,
            finished: false,
            csv,
        }
    }

    /// Append received bytes to the internal buffer.
    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Mark end of input so the final unterminated line becomes parseable.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Try to extract the next sample from the buffer.
    /// Returns `None` if no complete line is available yet.
    pub fn next_sample(&mut self) -> Option<Result<SensorSample, RecordingError>> {
        loop {
            let raw = self.take_line()?;
            self.line += 1;

            let mut record = csv::StringRecord::new();
            let mut reader = self.csv.from_reader(raw.trim_ascii_start());
            match reader.read_record(&mut record) {
                // Comment or empty line.
                Ok(false) => continue,
                Ok(true) if record.len() == 1 && record[0].is_empty() => continue,
                Ok(true) => return Some(parse_record(&record, self.line)),
                Err(e) => return Some(Err(csv_error(e, None, self.line))),
            }
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let buf = self.buffer.make_contiguous();
        match buf.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let line = buf[..end].to_vec();
                self.buffer.drain(..=end);
                Some(line)
            }
            None if self.finished && !buf.is_empty() => {
                let line = buf.to_vec();
                self.buffer.clear();
                Some(line)
            }
            None => None,
        }
    }
}

impl Default for RecordingParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a whole in-memory recording, stopping at the first malformed line.
pub fn parse_recording(text: &str) -> Result<Vec<SensorSample>, RecordingError> {
    let mut parser = RecordingParser::new();
    parser.push_data(text.as_bytes());
    parser.finish();
    std::iter::from_fn(|| parser.next_sample()).collect()
}

/// Format a sample as one recording line (without the newline).
pub fn format_sample(sample: &SensorSample) -> String {
    let (kind, value) = match sample {
        SensorSample::AngularVelocity { value, .. } => ('g', value),
        SensorSample::Acceleration { value, .. } => ('a', value),
        SensorSample::MagneticField { value, .. } => ('m', value),
    };
    format!(
        "{kind},{:.6},{},{},{}",
        sample.timestamp().as_secs_f64(),
        value.x,
        value.y,
        value.z
    )
}

fn parse_record(
    record: &csv::StringRecord,
    line: usize,
) -> Result<SensorSample, RecordingError> {
    if record.len() != FIELD_COUNT {
        return Err(RecordingError::FieldCount {
            line,
            found: record.len(),
        });
    }

    let raw: RawSample = record
        .deserialize(None)
        .map_err(|e| csv_error(e, Some(record), line))?;

    if !raw.seconds.is_finite() || raw.seconds < 0.0 {
        return Err(RecordingError::InvalidTimestamp {
            line,
            value: raw.seconds,
        });
    }
    let timestamp = Duration::from_secs_f64(raw.seconds);
    let value = Vector3::new(raw.x, raw.y, raw.z);

    match raw.kind.as_str() {
        "g" => Ok(SensorSample::AngularVelocity { value, timestamp }),
        "a" => Ok(SensorSample::Acceleration { value, timestamp }),
        "m" => Ok(SensorSample::MagneticField { value, timestamp }),
        _ => Err(RecordingError::UnknownKind {
            line,
            kind: raw.kind,
        }),
    }
}

fn csv_error(
    error: csv::Error,
    record: Option<&csv::StringRecord>,
    line: usize,
) -> RecordingError {
    match error.kind() {
        csv::ErrorKind::Utf8 { .. } => RecordingError::Encoding { line },
        csv::ErrorKind::Deserialize { err, .. } => {
            let field = err
                .field()
                .and_then(|i| record?.get(i as usize))
                .map(str::to_string);
            match field {
                Some(value) => RecordingError::InvalidNumber { line, value },
                None => RecordingError::Csv {
                    line,
                    message: err.to_string(),
                },
            }
        }
        _ => RecordingError::Csv {
            line,
            message: error.to_string(),
        },
    }
}
