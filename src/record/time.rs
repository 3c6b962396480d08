//! Bus timestamp format
//!
//! Timestamps travel as `YYYY-MM-DDTHH:MM:SS.ffff`: a microsecond clock
//! truncated to four fractional digits by producers. Parsing accepts any
//! fractional width, including none.

use chrono::NaiveDateTime;

const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Format a timestamp for the wire, truncated to four fractional digits.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    let mut s = ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    s.truncate(s.len() - 2);
    s
}

/// Parse a wire timestamp.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, PARSE_FORMAT)
}
