//! Immutable cycle input captured when a scan completes

use crate::catalogue::WifiReadingTable;
use crate::features::{FeatureSchema, FeatureSet, FeatureVectorBuilder};
use crate::location::CoarseLocation;
use crate::snapshot::SensorSnapshot;
use crate::time::Timestamp;

/// Copy of every input an inference cycle reads
///
/// Taken on the control thread at cycle start, then moved to the worker, so
/// later sensor or scan updates cannot tear the cycle's view.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub snapshot: SensorSnapshot,
    pub readings: WifiReadingTable,
    pub location: Option<CoarseLocation>,
    pub captured_at: Timestamp,
}

impl Fingerprint {
    pub fn capture(
        snapshot: &SensorSnapshot,
        readings: &WifiReadingTable,
        location: Option<CoarseLocation>,
        captured_at: Timestamp,
    ) -> Self {
        Self {
            snapshot: *snapshot,
            readings: readings.clone(),
            location,
            captured_at,
        }
    }

    pub fn building(&self) -> &str {
        self.readings.catalogue().building()
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::for_catalogue(self.readings.catalogue())
    }

    pub fn features(&self) -> FeatureSet {
        FeatureVectorBuilder::build_set(&self.snapshot, &self.readings, self.location)
    }
}
