//! Tracker configuration
//!
//! ```json
//! {
//!   "building": "Cowles",
//!   "partition_scheme": "five_partition",
//!   "models_dir": "models",
//!   "log_dir": "logs",
//!   "location_fallback": ["gps", "network"]
//! }
//! ```
//!
//! Every field is optional in the document; missing ones take the defaults
//! below. `catalogue_path` replaces the bundled catalogues when set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalogue::CatalogueSet;
use crate::errors::{CoreError, CoreResult};
use crate::location::LocationProvider;
use crate::partition::PartitionScheme;

/// Building selected when none is configured
pub const DEFAULT_BUILDING: &str = "Cowles";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Building whose catalogue and models are active at start
    pub building: String,
    pub partition_scheme: PartitionScheme,
    /// Root of the `<building>/<scheme>/` model resource tree
    pub models_dir: PathBuf,
    /// Directory receiving instrumentation logs
    pub log_dir: PathBuf,
    pub catalogue_path: Option<PathBuf>,
    /// Providers queried, in order, when no location has been pushed
    pub location_fallback: Vec<LocationProvider>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            building: DEFAULT_BUILDING.to_string(),
            partition_scheme: PartitionScheme::default(),
            models_dir: PathBuf::from("models"),
            log_dir: PathBuf::from("logs"),
            catalogue_path: None,
            location_fallback: vec![LocationProvider::Gps, LocationProvider::Network],
        }
    }
}

impl TrackerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.building.trim().is_empty() {
            return Err(CoreError::Config("building must not be empty".into()));
        }
        Ok(())
    }

    /// Catalogues this configuration refers to
    pub fn catalogues(&self) -> CoreResult<CatalogueSet> {
        match &self.catalogue_path {
            Some(path) => CatalogueSet::from_json_file(path),
            None => CatalogueSet::bundled(),
        }
    }

    pub fn with_building(mut self, building: impl Into<String>) -> Self {
        self.building = building.into();
        self
    }

    pub fn with_partition_scheme(mut self, scheme: PartitionScheme) -> Self {
        self.partition_scheme = scheme;
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_catalogue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalogue_path = Some(path.into());
        self
    }

    pub fn with_location_fallback(mut self, providers: Vec<LocationProvider>) -> Self {
        self.location_fallback = providers;
        self
    }
}
