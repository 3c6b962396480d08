//! Bus record types and their wire codec
//!
//! Every value on the shared bus is a flat, delimiter-joined record. The
//! schema (field count and order) is implicit in the bus key, not
//! self-describing: `result` carries a [`SurveyRecord`], `cam_info` and
//! `website_value` both carry a [`CameraStateRecord`].

mod codec;
mod time;
mod types;

pub use codec::{CodecError, DELIMITER, encode, split};
pub use time::{format_timestamp, parse_timestamp};
pub use types::{CameraStateRecord, SurveyRecord};

/// Bus key for the Survey Record published by the capture watcher.
pub const SURVEY_KEY: &str = "result";

/// Bus key for the control node's report of actual camera state.
pub const CAM_INFO_KEY: &str = "cam_info";

/// Bus key for override requests from the dashboard.
pub const OVERRIDE_KEY: &str = "website_value";
