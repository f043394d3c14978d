//! # Sweep Readings
//!
//! Decoding and classification of raw serial lines into [`Reading`] records.
//!
//! A sweep record on the wire looks like:
//!
//! ```text
//! 1,frequency_sweep_easy,<c_frequency>,<real>,<imag>,<gain>,<magnitude>,<impedance>
//! ```
//!
//! The leading `1,frequency_sweep_easy` pair is the filter key; the remaining
//! tokens are kept verbatim as text.

use chrono::NaiveDateTime;

/// Column names of an exported reading, in order
pub const READING_COLUMNS: [&str; READING_FIELD_COUNT] = [
    "timestamp",
    "iteration_no",
    "frequency_sweep_type",
    "c_frequency",
    "real",
    "imag",
    "gain",
    "magnitude",
    "impedance",
];

/// Number of fields in a reading (timestamp + wire tokens)
pub const READING_FIELD_COUNT: usize = 9;

/// Number of comma-separated tokens in a sweep record
pub const WIRE_TOKEN_COUNT: usize = READING_FIELD_COUNT - 1;

/// ISO-8601 layout used for capture timestamps (local time, microseconds)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One timestamped sweep record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    captured_at: NaiveDateTime,
    tokens: [String; WIRE_TOKEN_COUNT],
}

/// Outcome of classifying one decoded line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Line is a sweep record and produced a reading
    Accepted(Reading),
    /// Line does not carry the record prefix
    Ignored,
    /// Line carries the prefix but has the wrong number of tokens
    Malformed { tokens: usize },
}

impl Reading {
    /// Formatted capture timestamp (field 0)
    pub fn timestamp(&self) -> String {
        self.captured_at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Wire tokens (fields 1..=8)
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Sweep frequency token, in kHz
    pub fn c_frequency(&self) -> &str {
        &self.tokens[2]
    }

    /// Impedance token, in ohms
    pub fn impedance(&self) -> &str {
        &self.tokens[7]
    }

    /// All nine fields as exported: timestamp followed by the wire tokens
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(READING_FIELD_COUNT);
        fields.push(self.timestamp());
        fields.extend(self.tokens.iter().cloned());
        fields
    }
}

/// Decode raw line bytes as UTF-8 and trim surrounding whitespace
///
/// Invalid byte sequences become U+FFFD instead of failing.
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

/// Classify a decoded line, producing a reading stamped with `now` if it is
/// a sweep record
///
/// The prefix match is exact and case-sensitive.
pub fn classify_line(line: &str, prefix: &str, now: NaiveDateTime) -> LineClass {
    if !line.starts_with(prefix) {
        return LineClass::Ignored;
    }

    let parts: Vec<&str> = line.split(',').collect();
    let tokens = match <[&str; WIRE_TOKEN_COUNT]>::try_from(parts) {
        Ok(parts) => parts.map(str::to_string),
        Err(parts) => return LineClass::Malformed { tokens: parts.len() },
    };

    LineClass::Accepted(Reading {
        captured_at: now,
        tokens,
    })
}

/// Parse a decoded line into a reading, or `None` if it is not a well-formed
/// sweep record
pub fn parse_line(line: &str, prefix: &str, now: NaiveDateTime) -> Option<Reading> {
    match classify_line(line, prefix, now) {
        LineClass::Accepted(reading) => Some(reading),
        _ => None,
    }
}
