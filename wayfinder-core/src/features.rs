//! Fingerprint feature vectors
//!
//! ## Layout
//!
//! Every vector has the same ordered layout, fixed by the catalogue of the
//! building it was built for:
//!
//! ```text
//! [ 13 sensor scalars | N access point levels | lat, lon, accuracy ]
//!   accelerometerX..     BSSID1..BSSIDN          missing when no fix
//! ```
//!
//! followed, in the training data, by one target column (`xPosition`,
//! `yPosition` or `partition`). The target is never known at inference time,
//! so vectors carry the [`Task`] tag rather than a placeholder column.
//!
//! The layout is a contract with the pre-trained models. Changing the order
//! here silently corrupts every prediction.
//!
//! ## Missing vs zero
//!
//! - A sensor that never reported is `Some(0.0)`
//! - An access point never seen is `Some(0.0)`
//! - An absent coarse location is `None` in all three location slots

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::catalogue::{AccessPointCatalogue, WifiReadingTable};
use crate::location::CoarseLocation;
use crate::snapshot::{SensorSnapshot, SENSOR_SCALARS};

/// Names of the sensor-derived fields, in vector order
pub const SENSOR_FIELDS: [&str; SENSOR_SCALARS] = [
    "accelerometerX",
    "accelerometerY",
    "accelerometerZ",
    "magneticX",
    "magneticY",
    "magneticZ",
    "light",
    "rotationX",
    "rotationY",
    "rotationZ",
    "orientationX",
    "orientationY",
    "orientationZ",
];

/// Names of the coarse location fields, in vector order
pub const LOCATION_FIELDS: [&str; 3] = ["latitude", "longitude", "locationAccuracy"];

/// Which model a vector is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    XPosition,
    YPosition,
    Partition,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::XPosition, Task::YPosition, Task::Partition];

    /// Name of the target column in the training schema
    pub const fn target_name(&self) -> &'static str {
        match self {
            Task::XPosition => "xPosition",
            Task::YPosition => "yPosition",
            Task::Partition => "partition",
        }
    }
}

/// Ordered, named feature slots for one building
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    building: String,
    names: Vec<String>,
    index: HashMap<String, usize>,
    access_points: usize,
}

impl FeatureSchema {
    pub fn for_catalogue(catalogue: &AccessPointCatalogue) -> Self {
        let access_points = catalogue.len();
        let names: Vec<String> = SENSOR_FIELDS
            .iter()
            .map(|name| name.to_string())
            .chain((1..=access_points).map(|i| format!("BSSID{i}")))
            .chain(LOCATION_FIELDS.iter().map(|name| name.to_string()))
            .collect();

        let index = names.iter().enumerate().map(|(i, name)| (name.clone(), i)).collect();

        Self {
            building: catalogue.building().to_string(),
            names,
            index,
            access_points,
        }
    }

    pub fn building(&self) -> &str {
        &self.building
    }

    /// Number of input features a model for this building must accept
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Slots holding access point levels
    pub fn access_point_range(&self) -> Range<usize> {
        SENSOR_SCALARS..SENSOR_SCALARS + self.access_points
    }

    /// Slots holding latitude, longitude and accuracy
    pub fn location_range(&self) -> Range<usize> {
        let start = SENSOR_SCALARS + self.access_points;
        start..start + LOCATION_FIELDS.len()
    }
}

/// One model input: a value per schema slot, `None` where missing
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<Option<f64>>,
    target: Task,
}

impl FeatureVector {
    pub fn new(values: Vec<Option<f64>>, target: Task) -> Self {
        Self { values, target }
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn target(&self) -> Task {
        self.target
    }

    /// Value of a slot; `None` when missing or out of range
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Assembles feature vectors from the live readings
///
/// Pure: reads its inputs, never mutates them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureVectorBuilder;

impl FeatureVectorBuilder {
    pub fn build(
        snapshot: &SensorSnapshot,
        readings: &WifiReadingTable,
        location: Option<CoarseLocation>,
        task: Task,
    ) -> FeatureVector {
        let sensors = snapshot.scalars().into_iter().map(|v| Some(f64::from(v)));
        let access_points = readings.levels().iter().map(|&level| Some(f64::from(level)));
        let location_fields = match location {
            Some(fix) => [Some(fix.latitude), Some(fix.longitude), Some(f64::from(fix.accuracy))],
            None => [None; 3],
        };

        let mut values = Vec::with_capacity(SENSOR_SCALARS + readings.len() + LOCATION_FIELDS.len());
        values.extend(sensors);
        values.extend(access_points);
        values.extend(location_fields);

        FeatureVector::new(values, task)
    }

    /// Build the three per-task vectors of one cycle from a single snapshot
    pub fn build_set(
        snapshot: &SensorSnapshot,
        readings: &WifiReadingTable,
        location: Option<CoarseLocation>,
    ) -> FeatureSet {
        let [x, y, partition] = Task::ALL.map(|task| Self::build(snapshot, readings, location, task));
        FeatureSet { x, y, partition }
    }
}

/// The x, y and partition vectors of one inference cycle
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub x: FeatureVector,
    pub y: FeatureVector,
    pub partition: FeatureVector,
}

impl FeatureSet {
    pub fn for_task(&self, task: Task) -> &FeatureVector {
        match task {
            Task::XPosition => &self.x,
            Task::YPosition => &self.y,
            Task::Partition => &self.partition,
        }
    }
}
