//! The two record schemas carried on the bus

use chrono::NaiveDateTime;

use super::codec::{self, CodecError};
use super::time::{format_timestamp, parse_timestamp};

/// Sentinel meaning "no value" for an optional Camera State field.
pub(crate) const SENTINEL: &str = "None";

/// Description of a remote preview capture, published by the capture
/// watcher on the `result` key.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRecord {
    /// Explicit permission flag; the producer currently always sets it.
    pub can_observe: bool,
    /// Capture start plus exposure duration (the scheduled end-time).
    pub scheduled: NaiveDateTime,
    /// Object / target name of the capture.
    pub mode: String,
    /// Filter name of the capture.
    pub filter: String,
    /// Integer part of the exposure duration.
    pub exposure_seconds: i64,
}

impl SurveyRecord {
    /// Field names in schema order, used in decode diagnostics.
    pub const FIELDS: [&'static str; 5] = ["decide", "datetime", "mode", "filter", "exptime"];

    pub fn encode(&self) -> String {
        codec::encode(&[
            if self.can_observe { "1" } else { "0" }.to_string(),
            format_timestamp(self.scheduled),
            self.mode.clone(),
            self.filter.clone(),
            self.exposure_seconds.to_string(),
        ])
    }

    pub fn decode(raw: &str) -> Result<Self, CodecError> {
        let segments = codec::split(raw, Self::FIELDS.len())?;
        let can_observe = match segments[0] {
            "1" => true,
            "0" => false,
            other => {
                return Err(CodecError::Flag {
                    field: Self::FIELDS[0],
                    value: other.to_string(),
                });
            }
        };
        let scheduled = parse_timestamp(segments[1]).map_err(|_| CodecError::Timestamp {
            field: Self::FIELDS[1],
            value: segments[1].to_string(),
        })?;
        let exposure_seconds = segments[4].parse().map_err(|_| CodecError::Number {
            field: Self::FIELDS[4],
            value: segments[4].to_string(),
        })?;
        Ok(Self {
            can_observe,
            scheduled,
            mode: segments[2].to_string(),
            filter: segments[3].to_string(),
            exposure_seconds,
        })
    }
}

/// Actual camera state (`cam_info`) or an override request
/// (`website_value`). Same schema, different producers; optional fields
/// carry the `None` sentinel when a producer has nothing to say for them.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraStateRecord {
    pub timestamp: NaiveDateTime,
    pub exposure_seconds: Option<i64>,
    pub filter: Option<String>,
    pub temperature: Option<f64>,
}

impl CameraStateRecord {
    /// Field names in schema order, used in decode diagnostics.
    pub const FIELDS: [&'static str; 4] = ["datetime", "exptime", "filter", "temp"];

    pub fn encode(&self) -> String {
        codec::encode(&[
            format_timestamp(self.timestamp),
            self.exposure_seconds
                .map_or_else(|| SENTINEL.to_string(), |v| v.to_string()),
            self.filter.clone().unwrap_or_else(|| SENTINEL.to_string()),
            self.temperature
                .map_or_else(|| SENTINEL.to_string(), |v| format!("{v:.2}")),
        ])
    }

    pub fn decode(raw: &str) -> Result<Self, CodecError> {
        let segments = codec::split(raw, Self::FIELDS.len())?;
        let timestamp = parse_timestamp(segments[0]).map_err(|_| CodecError::Timestamp {
            field: Self::FIELDS[0],
            value: segments[0].to_string(),
        })?;
        let exposure_seconds = match segments[1] {
            SENTINEL => None,
            // Producers may report fractional durations; keep the integer part.
            raw => Some(
                raw.split('.')
                    .next()
                    .unwrap_or(raw)
                    .parse()
                    .map_err(|_| CodecError::Number {
                        field: Self::FIELDS[1],
                        value: raw.to_string(),
                    })?,
            ),
        };
        let filter = match segments[2] {
            SENTINEL => None,
            name => Some(name.to_string()),
        };
        let temperature = match segments[3] {
            SENTINEL => None,
            raw => Some(raw.parse().map_err(|_| CodecError::Number {
                field: Self::FIELDS[3],
                value: raw.to_string(),
            })?),
        };
        Ok(Self {
            timestamp,
            exposure_seconds,
            filter,
            temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_survey_wire_form() {
        let record = SurveyRecord {
            can_observe: true,
            scheduled: ts(10, 0, 0),
            mode: "bias".to_string(),
            filter: "R".to_string(),
            exposure_seconds: 10,
        };
        assert_eq!(record.encode(), "1#2024-01-01T10:00:00.0000#bias#R#10");
    }

    #[test]
    fn test_survey_decodes_full_precision_timestamp() {
        let record = SurveyRecord::decode("1#2024-01-01T10:00:00.000000#bias#R#10").unwrap();
        assert!(record.can_observe);
        assert_eq!(record.scheduled, ts(10, 0, 0));
        assert_eq!(record.mode, "bias");
        assert_eq!(record.filter, "R");
        assert_eq!(record.exposure_seconds, 10);
    }

    #[test]
    fn test_survey_round_trip() {
        let record = SurveyRecord {
            can_observe: false,
            scheduled: ts(23, 45, 1),
            mode: "M31".to_string(),
            filter: "Ha".to_string(),
            exposure_seconds: 600,
        };
        assert_eq!(SurveyRecord::decode(&record.encode()).unwrap(), record);
    }

    #[test]
    fn test_survey_rejects_bad_flag() {
        let err = SurveyRecord::decode("yes#2024-01-01T10:00:00#bias#R#10").unwrap_err();
        assert!(matches!(err, CodecError::Flag { .. }));
    }

    #[test]
    fn test_survey_rejects_field_count() {
        let err = SurveyRecord::decode("1#2024-01-01T10:00:00#bias#R").unwrap_err();
        assert!(matches!(err, CodecError::FieldCount { .. }));
    }

    #[test]
    fn test_camera_state_sentinels_round_trip() {
        let record = CameraStateRecord {
            timestamp: ts(12, 30, 0),
            exposure_seconds: Some(30),
            filter: None,
            temperature: None,
        };
        let wire = record.encode();
        assert_eq!(wire, "2024-01-01T12:30:00.0000#30#None#None");
        assert_eq!(CameraStateRecord::decode(&wire).unwrap(), record);
    }

    #[test]
    fn test_camera_state_all_fields() {
        let record = CameraStateRecord {
            timestamp: ts(1, 2, 3),
            exposure_seconds: Some(120),
            filter: Some("V".to_string()),
            temperature: Some(-10.25),
        };
        let decoded = CameraStateRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_camera_state_fractional_exposure_truncates() {
        let decoded = CameraStateRecord::decode("2024-01-01T01:02:03#10.937#R#-5.0").unwrap();
        assert_eq!(decoded.exposure_seconds, Some(10));
    }

    #[test]
    fn test_camera_state_rejects_bad_temperature() {
        let err = CameraStateRecord::decode("2024-01-01T01:02:03#10#R#warm").unwrap_err();
        assert!(matches!(err, CodecError::Number { field: "temp", .. }));
    }
}
