//! scopelink - twin-telescope observation coordinator
//!
//! Two independently operated observation nodes cooperate through a shared
//! Redis key-value store used as an asynchronous message bus; there is no
//! direct RPC between them. The remote node watches for preview captures
//! and publishes their timing as Survey Records; the local node polls those
//! records and only takes matching exposures while the remote target is
//! actually being observed. An optional operator dashboard injects
//! exposure-parameter overrides through the same bus.
//!
//! # Modules
//!
//! - [`record`] - record schemas and their delimited wire codec
//! - [`bus`] - shared bus client (Redis and in-memory)
//! - [`decision`] - the pure scheduling predicate
//! - [`watcher`] - capture watcher, the producer node
//! - [`control`] - control loop state machine, the consumer node
//! - [`hardware`] - camera/filter-wheel capability traits and simulators
//! - [`fits`] - minimal FITS primary-HDU read/write
//! - [`config`] - configuration types and loading

pub mod bus;
pub mod cli;
pub mod config;
pub mod control;
pub mod decision;
pub mod fits;
pub mod hardware;
pub mod record;
pub mod watcher;

// Re-export commonly used types
pub use bus::{Bus, BusError, MemoryBus, RedisBus, RetryPolicy};
pub use config::{BusConfig, Config};
pub use control::{ControlConfig, ControlEngine, ControlError, ExposureParams, LoopState};
pub use decision::{decide, decide_at};
pub use hardware::{
    Camera, DeviceRole, FilterWheel, HardwareError, RasterBuffer, SimulatedCamera,
    SimulatedFilterWheel,
};
pub use record::{
    CAM_INFO_KEY, CameraStateRecord, CodecError, OVERRIDE_KEY, SURVEY_KEY, SurveyRecord,
};
pub use watcher::{CaptureWatcher, WatcherConfig, WatcherError};
