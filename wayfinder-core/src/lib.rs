//! Fingerprint assembly for Wayfinder
//!
//! Turns the latest sensor, WiFi and coarse location readings into the
//! fixed-layout feature vectors consumed by the pre-trained position models.
//!
//! Key constraints:
//! - Vector layout is fixed per building by its access point catalogue
//! - Absent location is *missing*, an unseen access point is 0
//! - Building is pure and cheap enough to run on any thread
//!
//! ```no_run
//! use std::sync::Arc;
//! use wayfinder_core::{CatalogueSet, FeatureVectorBuilder, SensorSnapshot, Task, WifiReadingTable};
//!
//! let catalogues = CatalogueSet::bundled()?;
//! let mut readings = WifiReadingTable::new(catalogues.select("Cowles")?);
//! readings.record(&"00:17:0f:8d:c3:e0".parse()?, -67);
//!
//! let vector = FeatureVectorBuilder::build(&SensorSnapshot::default(), &readings, None, Task::Partition);
//! assert_eq!(vector.len(), 13 + 156 + 3);
//! # Ok::<(), wayfinder_core::CoreError>(())
//! ```

#![deny(unsafe_code)]

pub mod catalogue;
pub mod config;
pub mod errors;
pub mod events;
pub mod features;
pub mod fingerprint;
pub mod location;
pub mod partition;
pub mod snapshot;
pub mod time;

// Public API
pub use catalogue::{AccessPointCatalogue, Bssid, CatalogueSet, WifiReadingTable};
pub use config::TrackerConfig;
pub use errors::{CoreError, CoreResult};
pub use events::{ScanObservation, SensorEvent, SensorType};
pub use features::{FeatureSchema, FeatureSet, FeatureVector, FeatureVectorBuilder, Task};
pub use fingerprint::Fingerprint;
pub use location::{CoarseLocation, LocationProvider, LocationSource, LocationState, NoLocation};
pub use partition::{PartitionLabel, PartitionScheme};
pub use snapshot::{OrientationSource, SensorSnapshot};
pub use time::{format_timestamp, FixedTime, SystemTime, TimeSource, Timestamp};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
