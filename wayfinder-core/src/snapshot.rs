//! Last-known-value store for the physical sensors
//!
//! Channels update independently as readings arrive, so a snapshot mixes
//! readings taken at different times. Readers copy the whole struct at
//! cycle start; nothing reads individual fields across threads.

use crate::events::{SensorEvent, SensorType};

/// Number of sensor-derived scalars at the head of every fingerprint
pub const SENSOR_SCALARS: usize = 13;

/// Derives device orientation from accelerometer and magnetometer readings
///
/// The orientation math belongs to the platform. `None` means the platform
/// could not derive one from these inputs (e.g. free fall), in which case the
/// previous orientation is kept.
pub trait OrientationSource: Send + Sync {
    fn orientation(&self, accelerometer: &[f32; 3], magnetic: &[f32; 3]) -> Option<[f32; 3]>;
}

/// Latest value of each monitored physical quantity
///
/// Channels that never reported read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSnapshot {
    pub accelerometer: [f32; 3],
    pub magnetic: [f32; 3],
    pub light: f32,
    pub rotation: [f32; 3],
    pub orientation: [f32; 3],
}

impl SensorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a reading into the snapshot
    ///
    /// Orientation is recomputed after accelerometer and magnetometer
    /// readings only.
    pub fn apply(&mut self, event: &SensorEvent, orientation: Option<&dyn OrientationSource>) {
        match event.sensor_type {
            SensorType::Accelerometer => self.accelerometer = event.values,
            SensorType::MagneticField => self.magnetic = event.values,
            SensorType::Light => self.light = event.values[0],
            SensorType::RotationVector => self.rotation = event.values,
        }

        if matches!(event.sensor_type, SensorType::Accelerometer | SensorType::MagneticField) {
            if let Some(derived) = orientation.and_then(|o| o.orientation(&self.accelerometer, &self.magnetic)) {
                self.orientation = derived;
            }
        }
    }

    /// Sensor scalars in fingerprint order
    pub fn scalars(&self) -> [f32; SENSOR_SCALARS] {
        let [ax, ay, az] = self.accelerometer;
        let [mx, my, mz] = self.magnetic;
        let [rx, ry, rz] = self.rotation;
        let [ox, oy, oz] = self.orientation;
        [ax, ay, az, mx, my, mz, self.light, rx, ry, rz, ox, oy, oz]
    }
}
