//! Control loop (consumer node)
//!
//! The state machine that ties remote capture events to local exposures:
//! poll the Survey Record, run the decision engine, apply eligible
//! dashboard overrides, trigger the camera, republish the actual state.

mod config;
mod engine;

pub use config::ControlConfig;
pub use engine::{ControlEngine, ControlError, ExposureParams, LoopState, session_dir};
