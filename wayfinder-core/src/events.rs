//! Input events delivered by the platform collaborators
//!
//! ## Overview
//!
//! Three independent, asynchronous streams feed the tracker:
//!
//! ```text
//! Sensors ──→ SensorEvent ──────→ SensorSnapshot (last value per channel)
//! WiFi    ──→ ScanObservation[] ─→ WifiReadingTable (filtered by catalogue)
//! GPS/Net ──→ CoarseLocation ───→ LocationState (optional)
//! ```
//!
//! Events carry only the raw values. None of them triggers inference on its
//! own; a completed WiFi scan does, and it reads whatever the other two
//! streams last delivered.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Physical sensors whose readings enter the fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    Accelerometer,
    MagneticField,
    Light,
    RotationVector,
}

impl SensorType {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            SensorType::Accelerometer => "accelerometer",
            SensorType::MagneticField => "magnetic_field",
            SensorType::Light => "light",
            SensorType::RotationVector => "rotation_vector",
        }
    }

    /// Get expected unit of measurement
    pub const fn unit(&self) -> &'static str {
        match self {
            SensorType::Accelerometer => "m/s²",
            SensorType::MagneticField => "μT",
            SensorType::Light => "lx",
            SensorType::RotationVector => "",
        }
    }

    /// Number of leading values consumed from an event of this sensor
    pub const fn arity(&self) -> usize {
        match self {
            SensorType::Light => 1,
            _ => 3,
        }
    }
}

/// A single reading from one physical sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    /// Which sensor produced the reading
    pub sensor_type: SensorType,
    /// Leading values of the reading; unused trailing slots are zero
    pub values: [f32; 3],
    /// When the reading was taken
    pub timestamp: Timestamp,
}

impl SensorEvent {
    /// Build an event from the platform's value array
    ///
    /// Platforms may deliver more values than the fingerprint uses (the
    /// rotation vector carries a scalar component); extra values are ignored.
    /// Returns `None` when fewer values than [`SensorType::arity`] arrive.
    pub fn new(sensor_type: SensorType, values: &[f32], timestamp: Timestamp) -> Option<Self> {
        let arity = sensor_type.arity();
        if values.len() < arity {
            return None;
        }

        let mut fixed = [0.0; 3];
        fixed[..arity].copy_from_slice(&values[..arity]);

        Some(Self {
            sensor_type,
            values: fixed,
            timestamp,
        })
    }
}

/// One access point seen by a WiFi scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanObservation {
    /// Access point hardware address as reported by the platform
    pub bssid: String,
    /// Received signal level in dBm
    pub level: i32,
}

impl ScanObservation {
    pub fn new(bssid: impl Into<String>, level: i32) -> Self {
        Self {
            bssid: bssid.into(),
            level,
        }
    }
}
