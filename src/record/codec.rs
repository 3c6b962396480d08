//! Delimited wire codec for bus records

use thiserror::Error;

/// Reserved field delimiter. Field values must not contain it; that is a
/// caller contract, not a runtime check (no escaping is performed).
pub const DELIMITER: char = '#';

/// Errors raised while decoding a wire record
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("record has {actual} fields, schema expects {expected}")]
    FieldCount { expected: usize, actual: usize },

    #[error("field {field}: invalid timestamp {value:?}")]
    Timestamp { field: &'static str, value: String },

    #[error("field {field}: invalid number {value:?}")]
    Number { field: &'static str, value: String },

    #[error("field {field}: invalid flag {value:?} (expected 1 or 0)")]
    Flag { field: &'static str, value: String },
}

/// Join field string representations with the delimiter, in schema order.
pub fn encode(fields: &[String]) -> String {
    fields.join(&DELIMITER.to_string())
}

/// Split a wire record into exactly `expected` segments.
///
/// Fails when the segment count does not match the schema; a value that
/// contained the delimiter surfaces here as a count mismatch.
pub fn split(raw: &str, expected: usize) -> Result<Vec<&str>, CodecError> {
    let segments: Vec<&str> = raw.split(DELIMITER).collect();
    if segments.len() != expected {
        return Err(CodecError::FieldCount {
            expected,
            actual: segments.len(),
        });
    }
    Ok(segments)
}
