//! Observing-hardware capability interfaces
//!
//! The control node drives a camera and a filter wheel through these
//! traits. Real driver bindings live outside this crate; the bundled
//! [`SimulatedCamera`]/[`SimulatedFilterWheel`] stand in for them in tests
//! and dry runs, the same way the original rig was exercised against
//! simulator drivers.

mod sim;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

pub use sim::{SimulatedCamera, SimulatedFilterWheel};

/// Role tag assigned at construction. Device identity is never inferred
/// from a string representation after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Camera,
    FilterWheel,
    Focuser,
}

impl DeviceRole {
    pub fn name(self) -> &'static str {
        match self {
            DeviceRole::Camera => "camera",
            DeviceRole::FilterWheel => "filter wheel",
            DeviceRole::Focuser => "focuser",
        }
    }
}

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("{role} connect failed: {reason}", role = .role.name())]
    Connect { role: DeviceRole, reason: String },

    #[error("{role} is not connected", role = .role.name())]
    NotConnected { role: DeviceRole },

    #[error("no image available to read")]
    NoImage,

    #[error("target temperature control not supported by this driver")]
    TemperatureControlUnsupported,

    #[error("filter position {0} out of range")]
    FilterOutOfRange(usize),
}

/// One captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u16>,
}

impl RasterBuffer {
    /// Rotate the frame 90 degrees counter-clockwise. Frames are rotated
    /// once before being written to disk.
    pub fn rotated90(&self) -> RasterBuffer {
        let mut pixels = vec![0u16; self.pixels.len()];
        for row in 0..self.height {
            for col in 0..self.width {
                let src = row * self.width + col;
                let dst = (self.width - 1 - col) * self.height + row;
                pixels[dst] = self.pixels[src];
            }
        }
        RasterBuffer {
            width: self.height,
            height: self.width,
            pixels,
        }
    }
}

/// Camera capability interface.
///
/// `start_exposure` returns immediately; completion is observed by polling
/// `image_ready` until the device reports the frame.
#[async_trait]
pub trait Camera: Send {
    fn role(&self) -> DeviceRole;

    async fn connect(&mut self) -> Result<(), HardwareError>;
    async fn disconnect(&mut self) -> Result<(), HardwareError>;

    async fn start_exposure(&mut self, seconds: f64, open_shutter: bool)
    -> Result<(), HardwareError>;
    async fn image_ready(&mut self) -> Result<bool, HardwareError>;
    async fn read_image(&mut self) -> Result<RasterBuffer, HardwareError>;

    /// Duration of the most recent exposure, in seconds.
    fn last_exposure_duration(&self) -> f64;
    /// Start time of the most recent exposure.
    fn last_exposure_start(&self) -> Option<NaiveDateTime>;

    async fn temperature(&mut self) -> Result<f64, HardwareError>;
    fn can_set_target_temperature(&self) -> bool;
    async fn set_target_temperature(&mut self, value: f64) -> Result<(), HardwareError>;
    async fn set_cooler(&mut self, on: bool) -> Result<(), HardwareError>;

    fn bin_x(&self) -> u32;
    fn bin_y(&self) -> u32;
    fn sensor_name(&self) -> &str;
}

/// Filter wheel capability interface.
#[async_trait]
pub trait FilterWheel: Send {
    fn role(&self) -> DeviceRole;

    async fn connect(&mut self) -> Result<(), HardwareError>;
    async fn disconnect(&mut self) -> Result<(), HardwareError>;

    async fn position(&mut self) -> Result<usize, HardwareError>;
    async fn set_position(&mut self, index: usize) -> Result<(), HardwareError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate90() {
        // 3x2 frame:
        //   1 2 3
        //   4 5 6
        let frame = RasterBuffer {
            width: 3,
            height: 2,
            pixels: vec![1, 2, 3, 4, 5, 6],
        };
        // Counter-clockwise:
        //   3 6
        //   2 5
        //   1 4
        let rotated = frame.rotated90();
        assert_eq!(rotated.width, 2);
        assert_eq!(rotated.height, 3);
        assert_eq!(rotated.pixels, vec![3, 6, 2, 5, 1, 4]);
    }

    #[test]
    fn test_rotate90_square_twice_is_flip() {
        let frame = RasterBuffer {
            width: 2,
            height: 2,
            pixels: vec![1, 2, 3, 4],
        };
        let twice = frame.rotated90().rotated90();
        assert_eq!(twice.pixels, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_role_names() {
        assert_eq!(DeviceRole::Camera.name(), "camera");
        assert_eq!(DeviceRole::FilterWheel.name(), "filter wheel");
    }
}
