//! Integration tests for scopelink
//!
//! These tests run the control loop state machine end-to-end against the
//! in-memory bus and the simulated hardware.

use std::sync::Arc;

use chrono::{Duration, Local};
use tempfile::TempDir;

use scopelink::bus::{Bus, MemoryBus};
use scopelink::control::{ControlConfig, ControlEngine, LoopState};
use scopelink::hardware::{SimulatedCamera, SimulatedFilterWheel};
use scopelink::record::{CAM_INFO_KEY, CameraStateRecord, OVERRIDE_KEY, SURVEY_KEY, SurveyRecord};

fn test_engine(bus: Arc<MemoryBus>, data_dir: &TempDir) -> ControlEngine {
    let config = ControlConfig {
        poll_interval_secs: 1,
        connect_retry_secs: 1,
        image_ready_poll_ms: 1,
        data_dir: data_dir.path().to_path_buf(),
        filters: ["L", "R", "G", "B"].map(String::from).to_vec(),
    };
    let camera = Box::new(SimulatedCamera::new());
    let wheel = Box::new(SimulatedFilterWheel::new(4));
    ControlEngine::new(config, bus, camera, wheel)
}

fn survey_now(filter: &str, exposure_seconds: i64) -> SurveyRecord {
    SurveyRecord {
        can_observe: true,
        scheduled: Local::now().naive_local(),
        mode: "bias".to_string(),
        filter: filter.to_string(),
        exposure_seconds,
    }
}

async fn publish_override(bus: &MemoryBus, record: &CameraStateRecord) {
    bus.set(OVERRIDE_KEY, &record.encode()).await.unwrap();
}

// =============================================================================
// Full poll-decide-observe cycle
// =============================================================================

#[tokio::test]
async fn test_survey_record_drives_an_observation() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());
    bus.set(SURVEY_KEY, &survey_now("R", 10).encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);

    // INIT takes the first exposure and records the baseline.
    assert_eq!(engine.step().await.unwrap(), LoopState::Poll);
    let baseline = engine.baseline().expect("baseline set at init");

    // The scheduled end is now, so the decision is true even for a 10 s
    // exposure (the window clamps to one minute).
    assert_eq!(engine.step().await.unwrap(), LoopState::Observe);

    // Neutral override: fresh, but all fields sentinel.
    publish_override(
        &bus,
        &CameraStateRecord {
            timestamp: baseline + Duration::seconds(1),
            exposure_seconds: None,
            filter: None,
            temperature: None,
        },
    )
    .await;

    assert_eq!(engine.step().await.unwrap(), LoopState::Poll);

    // The observation ran with the survey's parameters.
    assert_eq!(engine.active_params().filter, "R");
    assert_eq!(engine.active_params().exposure_seconds, 10);

    let state = CameraStateRecord::decode(&bus.peek(CAM_INFO_KEY).unwrap()).unwrap();
    assert_eq!(state.exposure_seconds, Some(10));
    assert_eq!(state.filter, Some("R".to_string()));
    assert!(state.temperature.is_some());
}

#[tokio::test]
async fn test_decision_false_stays_in_poll() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());

    // Scheduled end two hours ago: far outside any window.
    let mut survey = survey_now("R", 10);
    survey.scheduled = survey.scheduled - Duration::hours(2);
    bus.set(SURVEY_KEY, &survey.encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);
    assert_eq!(engine.step().await.unwrap(), LoopState::Poll);
    assert_eq!(engine.step().await.unwrap(), LoopState::Poll);
    assert_eq!(engine.step().await.unwrap(), LoopState::Poll);
}

// =============================================================================
// Override staleness filter
// =============================================================================

#[tokio::test]
async fn test_stale_override_never_changes_parameters() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());
    bus.set(SURVEY_KEY, &survey_now("R", 10).encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);
    engine.step().await.unwrap();
    let baseline = engine.baseline().unwrap();

    // Override stamped one second before the session started.
    publish_override(
        &bus,
        &CameraStateRecord {
            timestamp: baseline - Duration::seconds(1),
            exposure_seconds: Some(99),
            filter: Some("B".to_string()),
            temperature: Some(5.0),
        },
    )
    .await;

    engine.step().await.unwrap(); // Poll -> Observe
    engine.step().await.unwrap(); // Observe -> Poll

    assert_eq!(engine.active_params().exposure_seconds, 10);
    assert_eq!(engine.active_params().filter, "R");

    let state = CameraStateRecord::decode(&bus.peek(CAM_INFO_KEY).unwrap()).unwrap();
    assert_eq!(state.exposure_seconds, Some(10));
    assert_eq!(state.filter, Some("R".to_string()));
}

#[tokio::test]
async fn test_fresh_override_applies_only_non_sentinel_fields() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());
    bus.set(SURVEY_KEY, &survey_now("R", 10).encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);
    engine.step().await.unwrap();
    let baseline = engine.baseline().unwrap();

    // Exposure and temperature change; filter stays sentinel.
    publish_override(
        &bus,
        &CameraStateRecord {
            timestamp: baseline + Duration::seconds(1),
            exposure_seconds: Some(30),
            filter: None,
            temperature: Some(-12.0),
        },
    )
    .await;

    engine.step().await.unwrap(); // Poll -> Observe
    engine.step().await.unwrap(); // Observe -> Poll

    assert_eq!(engine.active_params().exposure_seconds, 30);
    assert_eq!(engine.active_params().filter, "R");

    let state = CameraStateRecord::decode(&bus.peek(CAM_INFO_KEY).unwrap()).unwrap();
    assert_eq!(state.exposure_seconds, Some(30));
    // The simulated camera settles at its target temperature.
    assert_eq!(state.temperature, Some(-12.0));
}

#[tokio::test]
async fn test_override_applies_across_later_observations() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());
    bus.set(SURVEY_KEY, &survey_now("G", 10).encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);
    engine.step().await.unwrap();
    let baseline = engine.baseline().unwrap();

    publish_override(
        &bus,
        &CameraStateRecord {
            timestamp: baseline + Duration::seconds(1),
            exposure_seconds: Some(60),
            filter: Some("B".to_string()),
            temperature: None,
        },
    )
    .await;

    engine.step().await.unwrap();
    engine.step().await.unwrap();
    assert_eq!(engine.active_params().exposure_seconds, 60);
    assert_eq!(engine.active_params().filter, "B");

    // The same (still fresh) override merges again on the next cycle
    // without drifting the parameters.
    engine.step().await.unwrap();
    engine.step().await.unwrap();
    assert_eq!(engine.active_params().exposure_seconds, 60);
    assert_eq!(engine.active_params().filter, "B");
}

// =============================================================================
// Interrupt gate
// =============================================================================

#[tokio::test]
async fn test_interrupt_during_init_survives_to_the_next_boundary() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());
    bus.set(SURVEY_KEY, &survey_now("R", 10).encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);

    // The signal lands while INIT is still running its first transition.
    engine.request_interrupt();
    assert_eq!(engine.step().await.unwrap(), LoopState::Poll);

    // The transition completes, and the latch still holds the interrupt
    // for the boundary check.
    assert!(engine.interrupt_pending());
}

#[tokio::test]
async fn test_interrupt_during_observe_is_not_lost() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());
    bus.set(SURVEY_KEY, &survey_now("R", 10).encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);
    engine.step().await.unwrap();
    let baseline = engine.baseline().unwrap();

    publish_override(
        &bus,
        &CameraStateRecord {
            timestamp: baseline + Duration::seconds(1),
            exposure_seconds: None,
            filter: None,
            temperature: None,
        },
    )
    .await;

    assert_eq!(engine.step().await.unwrap(), LoopState::Observe);
    engine.request_interrupt();
    assert_eq!(engine.step().await.unwrap(), LoopState::Poll);
    assert!(engine.interrupt_pending());
}

// =============================================================================
// Session folder and frame output
// =============================================================================

#[tokio::test]
async fn test_frames_land_in_the_session_folder() {
    let dir = TempDir::new().unwrap();
    let bus = Arc::new(MemoryBus::new());
    bus.set(SURVEY_KEY, &survey_now("L", 1).encode()).await.unwrap();

    let mut engine = test_engine(Arc::clone(&bus), &dir);
    engine.step().await.unwrap();

    let sessions: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(sessions.len(), 1, "one session folder per run");

    let frames: Vec<_> = std::fs::read_dir(&sessions[0])
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(frames.len(), 1, "init exposure written");

    let header = scopelink::fits::read_primary_header(&frames[0]).unwrap();
    assert_eq!(header.require("FILTER").unwrap(), "L");
    assert_eq!(header.require("TIMESYS").unwrap(), "UTC");
    assert_eq!(header.require("INSTRUME").unwrap(), "SimSensor");
    assert!(header.require("DATE-OBS").is_ok());
    assert!(header.require("TIME-OBS").is_ok());
}
