//! Capture watcher implementation

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config::WatcherConfig;
use crate::bus::{Bus, BusError};
use crate::fits::{self, FitsError, FitsHeader};
use crate::record::{SURVEY_KEY, SurveyRecord};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("invalid watch pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("i/o error scanning watch directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("header of {} unreadable after {attempts} attempts", .path.display())]
    ReadRetriesExhausted { path: PathBuf, attempts: u32 },

    #[error("header field DATE-OBS has invalid value {0:?}")]
    BadDate(String),

    #[error("header field TIME-OBS has invalid value {0:?}")]
    BadTime(String),

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Build the Survey Record for one preview capture.
///
/// `scheduled` is the capture start (DATE-OBS + TIME-OBS) plus the exposure
/// duration; the permission flag is fixed true by this producer.
pub fn survey_from_header(header: &FitsHeader) -> Result<SurveyRecord, WatcherError> {
    let date_raw = header.require("DATE-OBS")?;
    let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
        .map_err(|_| WatcherError::BadDate(date_raw.to_string()))?;
    let time_raw = header.require("TIME-OBS")?;
    let time = NaiveTime::parse_from_str(time_raw, "%H:%M:%S%.f")
        .map_err(|_| WatcherError::BadTime(time_raw.to_string()))?;
    let exptime = header.require_f64("EXPTIME")?;

    let started = NaiveDateTime::new(date, time);
    let scheduled = started + ChronoDuration::microseconds((exptime * 1e6) as i64);

    Ok(SurveyRecord {
        can_observe: true,
        scheduled,
        mode: header.require("OBJECT")?.to_string(),
        filter: header.require("FILTER")?.to_string(),
        exposure_seconds: exptime.trunc() as i64,
    })
}

/// Watches one directory for new preview captures and publishes a Survey
/// Record per capture.
///
/// Detection is a fixed-interval scan diffed against the previous snapshot:
/// a path counts as created when it is new or when its modification time
/// moved (the preview file is deleted and rewritten in place by the remote
/// pipeline). Subdirectories are ignored.
pub struct CaptureWatcher {
    config: WatcherConfig,
    bus: Arc<dyn Bus>,
    pattern: glob::Pattern,
    snapshot: HashMap<PathBuf, SystemTime>,
}

impl CaptureWatcher {
    pub fn new(config: WatcherConfig, bus: Arc<dyn Bus>) -> Result<Self, WatcherError> {
        let pattern = glob::Pattern::new(&config.pattern)?;
        Ok(Self {
            config,
            bus,
            pattern,
            snapshot: HashMap::new(),
        })
    }

    /// Run until cancelled. Files already present at startup are primed
    /// into the snapshot without events, matching the external watcher
    /// contract of "one creation event per file created after start".
    pub async fn run(&mut self) -> Result<(), WatcherError> {
        self.prime().await?;
        info!(path = %self.config.path.display(), pattern = %self.config.pattern, "watching for previews");
        loop {
            tokio::time::sleep(self.config.scan_interval()).await;
            for path in self.scan_created()? {
                self.handle_created(&path).await?;
            }
        }
    }

    /// Record the current directory contents without emitting events.
    pub async fn prime(&mut self) -> Result<(), WatcherError> {
        self.snapshot = self.list_matching()?;
        Ok(())
    }

    /// Diff the directory against the last snapshot; returns newly created
    /// (or rewritten) matching files.
    pub fn scan_created(&mut self) -> Result<Vec<PathBuf>, WatcherError> {
        let current = self.list_matching()?;
        let mut created = Vec::new();
        for (path, mtime) in &current {
            if self.snapshot.get(path.as_path()) != Some(mtime) {
                created.push(path.clone());
            }
        }
        self.snapshot = current;
        Ok(created)
    }

    fn list_matching(&self) -> Result<HashMap<PathBuf, SystemTime>, WatcherError> {
        let mut matching = HashMap::new();
        for entry in std::fs::read_dir(&self.config.path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if self.pattern.matches(name) {
                let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                matching.insert(entry.path(), mtime);
            }
        }
        Ok(matching)
    }

    /// Process one creation event: settle, read the header (retrying on any
    /// failure), publish the Survey Record.
    pub async fn handle_created(&self, path: &Path) -> Result<(), WatcherError> {
        debug!(path = %path.display(), "preview created");
        tokio::time::sleep(self.config.settle_delay()).await;

        let header = self.read_header_with_retry(path).await?;
        let record = survey_from_header(&header)?;
        self.publish(&record).await?;
        Ok(())
    }

    /// Read the primary header, retrying at the settle interval on any
    /// failure; "file not yet complete" and genuine read errors are not
    /// distinguished.
    async fn read_header_with_retry(&self, path: &Path) -> Result<FitsHeader, WatcherError> {
        let mut attempts = 0u32;
        loop {
            match fits::read_primary_header(path) {
                Ok(header) => return Ok(header),
                Err(err) => {
                    attempts += 1;
                    if let Some(max) = self.config.max_read_attempts {
                        if attempts >= max {
                            warn!(path = %path.display(), attempts, "giving up on header read");
                            return Err(WatcherError::ReadRetriesExhausted {
                                path: path.to_path_buf(),
                                attempts,
                            });
                        }
                    }
                    debug!(path = %path.display(), error = %err, "header not readable yet, retrying");
                    tokio::time::sleep(self.config.settle_delay()).await;
                }
            }
        }
    }

    /// Publish to the Survey Record key, retrying on connectivity failures
    /// so no record is ever dropped.
    async fn publish(&self, record: &SurveyRecord) -> Result<(), WatcherError> {
        let wire = record.encode();
        loop {
            match self.bus.set(SURVEY_KEY, &wire).await {
                Ok(()) => {
                    info!(value = %wire, "survey record published");
                    return Ok(());
                }
                Err(err) if err.is_retryable() => {
                    warn!(error = %err, "bus write failed, retrying");
                    tokio::time::sleep(self.config.settle_delay()).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
