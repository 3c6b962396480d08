//! Control loop state machine

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Days, Local, NaiveDateTime, Timelike};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::config::ControlConfig;
use crate::bus::{Bus, BusError};
use crate::decision;
use crate::fits::{self, FitsError};
use crate::hardware::{Camera, FilterWheel, HardwareError};
use crate::record::{
    CAM_INFO_KEY, CameraStateRecord, CodecError, OVERRIDE_KEY, SURVEY_KEY, SurveyRecord,
    format_timestamp,
};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("record on key {key:?} undecodable: {source}")]
    Decode {
        key: &'static str,
        source: CodecError,
    },

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Control loop states. `Shutdown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Poll,
    Observe,
    Shutdown,
}

/// The exposure parameters currently in force on the local node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureParams {
    pub exposure_seconds: i64,
    pub filter: String,
}

/// Per-night session folder under `base`: hours before local noon belong to
/// the previous night. Created if absent.
pub fn session_dir(base: &Path, now: NaiveDateTime) -> PathBuf {
    let date = if now.hour() < 12 {
        now.date().checked_sub_days(Days::new(1)).unwrap_or(now.date())
    } else {
        now.date()
    };
    base.join(date.format("%Y-%m-%d").to_string())
}

/// Interrupt latch shared with the signal listener. A signal raised while a
/// state transition is in flight stays latched until a boundary consumes it.
#[derive(Default)]
struct InterruptGate {
    raised: AtomicBool,
    notify: Notify,
}

impl InterruptGate {
    fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a raise just before the poll
        // sleep registers still cuts the sleep short.
        self.notify.notify_one();
    }

    fn pending(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// The poll-decide-observe state machine of the local node.
///
/// Owns the bus handle and the hardware capabilities outright; nothing in
/// here reaches for a shared global.
pub struct ControlEngine {
    config: ControlConfig,
    bus: Arc<dyn Bus>,
    camera: Box<dyn Camera>,
    wheel: Box<dyn FilterWheel>,
    state: LoopState,
    /// Session-start marker; overrides older than this are rejected.
    baseline: Option<NaiveDateTime>,
    active: ExposureParams,
    session_path: PathBuf,
    interrupt: Arc<InterruptGate>,
}

impl ControlEngine {
    pub fn new(
        config: ControlConfig,
        bus: Arc<dyn Bus>,
        camera: Box<dyn Camera>,
        wheel: Box<dyn FilterWheel>,
    ) -> Self {
        let session_path = config.data_dir.clone();
        Self {
            config,
            bus,
            camera,
            wheel,
            state: LoopState::Init,
            baseline: None,
            active: ExposureParams {
                exposure_seconds: 0,
                filter: String::new(),
            },
            session_path,
            interrupt: Arc::new(InterruptGate::default()),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn baseline(&self) -> Option<NaiveDateTime> {
        self.baseline
    }

    pub fn active_params(&self) -> &ExposureParams {
        &self.active
    }

    pub fn camera(&self) -> &dyn Camera {
        self.camera.as_ref()
    }

    /// Raise the interrupt latch, as the signal listener does. Honored at
    /// the next state boundary, behind the confirmation gate.
    pub fn request_interrupt(&self) {
        self.interrupt.raise();
    }

    /// Whether an interrupt is latched and waiting for a state boundary.
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.pending()
    }

    /// Run until a confirmed interrupt. One listener latches the signal for
    /// the whole run, whatever state it arrives in; every state boundary
    /// consults the latch, and a refused confirmation resumes the prior
    /// state. A signal raised mid-transition (hardware connect, blocking
    /// bus read, exposure) is held until that transition completes.
    pub async fn run(&mut self) -> Result<(), ControlError> {
        let gate = Arc::clone(&self.interrupt);
        let listener = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                gate.raise();
            }
        });

        let result = self.run_gated().await;
        listener.abort();
        result
    }

    async fn run_gated(&mut self) -> Result<(), ControlError> {
        loop {
            if self.interrupt.take() {
                if confirm_shutdown().await {
                    self.state = LoopState::Shutdown;
                } else {
                    info!("shutdown refused, resuming");
                }
            }
            match self.state {
                LoopState::Init | LoopState::Observe => {
                    self.step().await?;
                }
                LoopState::Poll => {
                    let gate = Arc::clone(&self.interrupt);
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval()) => {
                            self.step().await?;
                        }
                        // The latch is consumed at the top of the loop.
                        _ = gate.notified() => {}
                    }
                }
                LoopState::Shutdown => {
                    self.camera.disconnect().await?;
                    self.wheel.disconnect().await?;
                    info!("hardware released, bye");
                    return Ok(());
                }
            }
        }
    }

    /// Advance the state machine by one transition. `run` adds the poll
    /// cadence and the interrupt gate around this.
    pub async fn step(&mut self) -> Result<LoopState, ControlError> {
        match self.state {
            LoopState::Init => {
                self.init().await?;
                self.state = LoopState::Poll;
            }
            LoopState::Poll => {
                if self.poll_once().await? {
                    self.state = LoopState::Observe;
                }
            }
            LoopState::Observe => {
                self.observe_once().await?;
                self.state = LoopState::Poll;
            }
            LoopState::Shutdown => {}
        }
        Ok(self.state)
    }

    /// Connect the hardware, create the session folder, and take the first
    /// exposure with whatever the current Survey Record specifies. Its
    /// start time becomes the session's baseline timestamp.
    async fn init(&mut self) -> Result<(), ControlError> {
        self.connect_hardware().await;

        let now = Local::now().naive_local();
        self.session_path = session_dir(&self.config.data_dir, now);
        std::fs::create_dir_all(&self.session_path)?;
        info!(path = %self.session_path.display(), "session folder ready");

        self.camera.set_cooler(false).await?;
        let survey = self.fetch_survey().await?;
        self.active = ExposureParams {
            exposure_seconds: survey.exposure_seconds,
            filter: survey.filter,
        };
        let started = self.expose().await?;
        self.baseline = Some(started);
        info!(baseline = %format_timestamp(started), "session baseline recorded");
        Ok(())
    }

    /// One poll cycle: fetch the Survey Record and run the decision engine.
    async fn poll_once(&mut self) -> Result<bool, ControlError> {
        self.camera.set_cooler(true).await?;
        let survey = self.fetch_survey().await?;
        let observe = decision::decide(
            survey.scheduled,
            survey.can_observe,
            survey.exposure_seconds,
        );
        debug!(observe, scheduled = %format_timestamp(survey.scheduled), "decision");
        Ok(observe)
    }

    /// One observation: apply a fresh override if any, expose, republish
    /// the actual camera state.
    async fn observe_once(&mut self) -> Result<(), ControlError> {
        let raw = self.bus.get(OVERRIDE_KEY).await?;
        let record = CameraStateRecord::decode(&raw).map_err(|source| ControlError::Decode {
            key: OVERRIDE_KEY,
            source,
        })?;

        match self.baseline {
            Some(baseline) if record.timestamp >= baseline => {
                self.apply_override(&record).await?;
            }
            _ => {
                debug!(timestamp = %format_timestamp(record.timestamp), "override predates session, ignored");
            }
        }

        self.expose().await?;
        Ok(())
    }

    /// Merge the non-sentinel fields of an override into the active
    /// parameters. Sentinel fields are left untouched.
    async fn apply_override(&mut self, record: &CameraStateRecord) -> Result<(), ControlError> {
        if let Some(filter) = &record.filter {
            self.active.filter = filter.clone();
        }
        if let Some(seconds) = record.exposure_seconds {
            self.active.exposure_seconds = seconds;
        }
        if let Some(target) = record.temperature {
            if self.camera.can_set_target_temperature() {
                self.camera.set_target_temperature(target).await?;
                info!(target, "target temperature set");
            } else {
                info!("target temperature control not supported by this driver");
            }
        }
        Ok(())
    }

    /// Retry hardware connects indefinitely at a fixed delay.
    async fn connect_hardware(&mut self) {
        loop {
            match self.camera.connect().await {
                Ok(()) => {
                    info!(role = self.camera.role().name(), "connected");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "camera connect failed, retrying");
                    tokio::time::sleep(self.config.connect_retry()).await;
                }
            }
        }
        loop {
            match self.wheel.connect().await {
                Ok(()) => {
                    info!(role = self.wheel.role().name(), "connected");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "filter wheel connect failed, retrying");
                    tokio::time::sleep(self.config.connect_retry()).await;
                }
            }
        }
    }

    async fn fetch_survey(&self) -> Result<SurveyRecord, ControlError> {
        let raw = self.bus.get(SURVEY_KEY).await?;
        SurveyRecord::decode(&raw).map_err(|source| ControlError::Decode {
            key: SURVEY_KEY,
            source,
        })
    }

    /// Trigger one exposure with the active parameters, write the frame to
    /// the session folder, and publish the actual state to `cam_info`.
    /// Returns the exposure start time.
    async fn expose(&mut self) -> Result<NaiveDateTime, ControlError> {
        if let Some(index) = resolve_filter(&self.config.filters, &self.active.filter) {
            self.wheel.set_position(index).await?;
        } else {
            warn!(filter = %self.active.filter, "unknown filter, wheel position unchanged");
        }

        // Durations at or below zero would be rejected by the driver.
        let seconds = (self.active.exposure_seconds as f64).max(0.001);
        self.camera.start_exposure(seconds, true).await?;
        loop {
            if self.camera.image_ready().await? {
                break;
            }
            tokio::time::sleep(self.config.image_ready_poll()).await;
        }

        let frame = self.camera.read_image().await?.rotated90();
        let temperature = self.camera.temperature().await?;
        let started = self
            .camera
            .last_exposure_start()
            .unwrap_or_else(|| Local::now().naive_local());

        let filter_name = self.current_filter_name().await?;
        let path = self
            .session_path
            .join(format!("test_{}.fits", Local::now().format("%Y%m%dT%H%M%S")));
        let cards = self.exposure_cards(started, &filter_name, temperature);
        fits::write_image(&path, &cards, &frame)?;
        info!(path = %path.display(), "frame saved");

        self.report_state(&filter_name, temperature).await?;
        Ok(started)
    }

    /// FITS header cards for a frame taken by this node.
    fn exposure_cards(
        &self,
        started: NaiveDateTime,
        filter_name: &str,
        temperature: f64,
    ) -> Vec<(&'static str, String, &'static str, bool)> {
        let mut time_obs = started.format("%H:%M:%S%.6f").to_string();
        time_obs.truncate(time_obs.len() - 2);
        vec![
            (
                "EXPTIME",
                format!("{:.0}", self.camera.last_exposure_duration()),
                "exposure duration in sec",
                false,
            ),
            (
                "DATE-OBS",
                started.format("%Y-%m-%d").to_string(),
                "YYYY-MM-DD",
                true,
            ),
            (
                "TIME-OBS",
                time_obs,
                "HH:MM:SS time of the exposure start",
                true,
            ),
            ("TIMESYS", "UTC".to_string(), "", true),
            ("FILTER", filter_name.to_string(), "filter name", true),
            (
                "TEMP",
                format!("{temperature:.2}"),
                "current CCD temperature in degrees Celsius",
                true,
            ),
            (
                "XBINNING",
                self.camera.bin_x().to_string(),
                "binning factor of X axis",
                false,
            ),
            (
                "YBINNING",
                self.camera.bin_y().to_string(),
                "binning factor of Y axis",
                false,
            ),
            (
                "INSTRUME",
                self.camera.sensor_name().to_string(),
                "sensor name",
                true,
            ),
        ]
    }

    /// Name of the filter at the current wheel position, falling back to
    /// the active parameter when the position has no configured name.
    async fn current_filter_name(&mut self) -> Result<String, ControlError> {
        let position = self.wheel.position().await?;
        Ok(self
            .config
            .filters
            .get(position)
            .cloned()
            .unwrap_or_else(|| self.active.filter.clone()))
    }

    /// Publish the actual camera state to `cam_info`, retrying on
    /// connectivity failures so the report is never dropped.
    async fn report_state(&mut self, filter_name: &str, temperature: f64) -> Result<(), ControlError> {
        let record = CameraStateRecord {
            timestamp: Local::now().naive_local(),
            exposure_seconds: Some(self.camera.last_exposure_duration().trunc() as i64),
            filter: Some(filter_name.to_string()),
            temperature: Some(temperature),
        };
        let wire = record.encode();
        loop {
            match self.bus.set(CAM_INFO_KEY, &wire).await {
                Ok(()) => {
                    info!(value = %wire, "camera state published");
                    return Ok(());
                }
                Err(err) if err.is_retryable() => {
                    warn!(error = %err, "bus write failed, retrying");
                    tokio::time::sleep(self.config.poll_interval()).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Map a filter override to a wheel position: a configured name wins, a
/// bare index is accepted as-is.
fn resolve_filter(filters: &[String], value: &str) -> Option<usize> {
    filters
        .iter()
        .position(|name| name == value)
        .or_else(|| value.parse().ok())
}

/// Interactive confirmation gate for the interrupt.
async fn confirm_shutdown() -> bool {
    let answer = tokio::task::spawn_blocking(|| {
        use std::io::Write;
        print!("Interrupt received. Really exit? y/n ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok();
        line
    })
    .await
    .unwrap_or_default();
    answer.trim().eq_ignore_ascii_case("y")
}
