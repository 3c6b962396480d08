//! Simulated camera and filter wheel
//!
//! Deterministic stand-ins for real drivers. The simulated camera reports
//! the frame ready as soon as an exposure has been started; it does not
//! model exposure wall time.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};

use super::{Camera, DeviceRole, FilterWheel, HardwareError, RasterBuffer};

const SIM_WIDTH: usize = 64;
const SIM_HEIGHT: usize = 48;

/// Simulated [`Camera`].
pub struct SimulatedCamera {
    connected: bool,
    cooler_on: bool,
    temperature: f64,
    target_temperature: Option<f64>,
    can_set_temperature: bool,
    exposure_pending: bool,
    last_duration: f64,
    last_start: Option<NaiveDateTime>,
    /// When set, connect attempts fail this many more times first.
    connect_failures_left: u32,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            connected: false,
            cooler_on: false,
            temperature: -5.0,
            target_temperature: None,
            can_set_temperature: true,
            exposure_pending: false,
            last_duration: 0.0,
            last_start: None,
            connect_failures_left: 0,
        }
    }

    /// Simulate a driver that rejects the first `count` connect attempts.
    pub fn failing_connects(mut self, count: u32) -> Self {
        self.connect_failures_left = count;
        self
    }

    /// Simulate a driver without temperature control.
    pub fn without_temperature_control(mut self) -> Self {
        self.can_set_temperature = false;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn cooler_is_on(&self) -> bool {
        self.cooler_on
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.target_temperature
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Camera for SimulatedCamera {
    fn role(&self) -> DeviceRole {
        DeviceRole::Camera
    }

    async fn connect(&mut self) -> Result<(), HardwareError> {
        if self.connect_failures_left > 0 {
            self.connect_failures_left -= 1;
            return Err(HardwareError::Connect {
                role: DeviceRole::Camera,
                reason: "driver not ready".to_string(),
            });
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), HardwareError> {
        self.connected = false;
        Ok(())
    }

    async fn start_exposure(
        &mut self,
        seconds: f64,
        _open_shutter: bool,
    ) -> Result<(), HardwareError> {
        if !self.connected {
            return Err(HardwareError::NotConnected {
                role: DeviceRole::Camera,
            });
        }
        self.last_start = Some(Local::now().naive_local());
        self.last_duration = seconds;
        self.exposure_pending = true;
        Ok(())
    }

    async fn image_ready(&mut self) -> Result<bool, HardwareError> {
        Ok(self.exposure_pending)
    }

    async fn read_image(&mut self) -> Result<RasterBuffer, HardwareError> {
        if !self.exposure_pending {
            return Err(HardwareError::NoImage);
        }
        self.exposure_pending = false;
        // Flat synthetic frame with a gradient, good enough to exercise the
        // write path.
        let pixels = (0..SIM_WIDTH * SIM_HEIGHT)
            .map(|i| (i % 4096) as u16)
            .collect();
        Ok(RasterBuffer {
            width: SIM_WIDTH,
            height: SIM_HEIGHT,
            pixels,
        })
    }

    fn last_exposure_duration(&self) -> f64 {
        self.last_duration
    }

    fn last_exposure_start(&self) -> Option<NaiveDateTime> {
        self.last_start
    }

    async fn temperature(&mut self) -> Result<f64, HardwareError> {
        Ok(self.temperature)
    }

    fn can_set_target_temperature(&self) -> bool {
        self.can_set_temperature
    }

    async fn set_target_temperature(&mut self, value: f64) -> Result<(), HardwareError> {
        if !self.can_set_temperature {
            return Err(HardwareError::TemperatureControlUnsupported);
        }
        self.target_temperature = Some(value);
        self.temperature = value;
        Ok(())
    }

    async fn set_cooler(&mut self, on: bool) -> Result<(), HardwareError> {
        self.cooler_on = on;
        Ok(())
    }

    fn bin_x(&self) -> u32 {
        1
    }

    fn bin_y(&self) -> u32 {
        1
    }

    fn sensor_name(&self) -> &str {
        "SimSensor"
    }
}

/// Simulated [`FilterWheel`] with a fixed number of slots.
pub struct SimulatedFilterWheel {
    connected: bool,
    position: usize,
    slots: usize,
}

impl SimulatedFilterWheel {
    pub fn new(slots: usize) -> Self {
        Self {
            connected: false,
            position: 0,
            slots,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[async_trait]
impl FilterWheel for SimulatedFilterWheel {
    fn role(&self) -> DeviceRole {
        DeviceRole::FilterWheel
    }

    async fn connect(&mut self) -> Result<(), HardwareError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), HardwareError> {
        self.connected = false;
        Ok(())
    }

    async fn position(&mut self) -> Result<usize, HardwareError> {
        Ok(self.position)
    }

    async fn set_position(&mut self, index: usize) -> Result<(), HardwareError> {
        if index >= self.slots {
            return Err(HardwareError::FilterOutOfRange(index));
        }
        self.position = index;
        Ok(())
    }
}
