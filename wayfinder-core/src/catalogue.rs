//! Access point catalogues and the per-session reading table
//!
//! A catalogue is the ordered list of BSSIDs tracked in one building. Its
//! order fixes each access point's slot in the feature vector, so it is part
//! of the contract with the pre-trained models for that building.
//!
//! ```text
//! scan results ──→ WifiReadingTable::record ──→ levels[slot]
//!                        │
//!                        └─ unknown BSSID → dropped
//! ```
//!
//! Catalogues are immutable once built and shared behind `Arc`. Changing
//! building replaces the table's catalogue wholesale and zeroes every level;
//! there is no way to carry a reading across catalogues.

use core::fmt;
use core::str::FromStr;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};
use crate::events::ScanObservation;

/// Length of a textual MAC address, `aa:bb:cc:dd:ee:ff`
pub const BSSID_LEN: usize = 17;

/// Catalogue document version this crate understands
pub const CATALOGUE_VERSION: u32 = 1;

const BUNDLED_CATALOGUES: &str = include_str!("../data/catalogues.json");

/// Access point hardware address, normalised to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bssid(heapless::String<BSSID_LEN>);

impl Bssid {
    /// Parse a colon separated MAC address, accepting either case
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        let invalid = || CoreError::InvalidBssid(raw.to_string());

        if trimmed.len() != BSSID_LEN {
            return Err(invalid());
        }

        let mut normalised = heapless::String::new();
        for (i, c) in trimmed.chars().enumerate() {
            let ok = if i % 3 == 2 { c == ':' } else { c.is_ascii_hexdigit() };
            if !ok {
                return Err(invalid());
            }
            normalised.push(c.to_ascii_lowercase()).map_err(|_| invalid())?;
        }

        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bssid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered, duplicate-free list of the access points tracked in a building
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPointCatalogue {
    building: String,
    access_points: Vec<Bssid>,
    index: HashMap<Bssid, usize>,
}

impl AccessPointCatalogue {
    /// Build a catalogue, rejecting malformed or repeated BSSIDs
    pub fn new<S: AsRef<str>>(building: impl Into<String>, access_points: &[S]) -> CoreResult<Self> {
        let building = building.into();
        let mut ordered = Vec::with_capacity(access_points.len());
        let mut index = HashMap::with_capacity(access_points.len());

        for raw in access_points {
            let bssid = Bssid::parse(raw.as_ref())?;
            if index.insert(bssid.clone(), ordered.len()).is_some() {
                return Err(CoreError::DuplicateBssid {
                    building,
                    bssid: bssid.to_string(),
                });
            }
            ordered.push(bssid);
        }

        Ok(Self {
            building,
            access_points: ordered,
            index,
        })
    }

    pub fn building(&self) -> &str {
        &self.building
    }

    /// Access points in slot order
    pub fn access_points(&self) -> &[Bssid] {
        &self.access_points
    }

    /// Slot of an access point, `None` if it is not tracked here
    pub fn slot(&self, bssid: &Bssid) -> Option<usize> {
        self.index.get(bssid).copied()
    }

    pub fn contains(&self, bssid: &Bssid) -> bool {
        self.index.contains_key(bssid)
    }

    pub fn len(&self) -> usize {
        self.access_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_points.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogueDocument {
    version: u32,
    buildings: Vec<BuildingEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuildingEntry {
    id: String,
    access_points: Vec<String>,
}

/// All catalogues known to the deployment, keyed by building id
#[derive(Debug, Clone)]
pub struct CatalogueSet {
    catalogues: Vec<Arc<AccessPointCatalogue>>,
}

impl CatalogueSet {
    /// Catalogues compiled into the crate
    pub fn bundled() -> CoreResult<Self> {
        Self::from_json_str(BUNDLED_CATALOGUES)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let document: CatalogueDocument = serde_json::from_str(text)?;
        if document.version != CATALOGUE_VERSION {
            return Err(CoreError::Config(format!(
                "unsupported catalogue version {} (expected {})",
                document.version, CATALOGUE_VERSION
            )));
        }

        let mut catalogues: Vec<Arc<AccessPointCatalogue>> = Vec::with_capacity(document.buildings.len());
        for entry in document.buildings {
            if catalogues.iter().any(|c| c.building() == entry.id) {
                return Err(CoreError::Config(format!("building '{}' listed twice", entry.id)));
            }
            catalogues.push(Arc::new(AccessPointCatalogue::new(entry.id, &entry.access_points)?));
        }
        debug!("Loaded {} building catalogues", catalogues.len());

        Ok(Self { catalogues })
    }

    /// Catalogue for a building
    pub fn select(&self, building: &str) -> CoreResult<Arc<AccessPointCatalogue>> {
        self.catalogues
            .iter()
            .find(|c| c.building() == building)
            .cloned()
            .ok_or_else(|| CoreError::UnknownBuilding(building.to_string()))
    }

    /// Building ids in document order
    pub fn buildings(&self) -> impl Iterator<Item = &str> {
        self.catalogues.iter().map(|c| c.building())
    }
}

/// Last seen signal level per catalogue access point
///
/// A level of 0 means "not seen this session". A genuine 0 dBm reading is
/// indistinguishable from that; models were trained with the same encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct WifiReadingTable {
    catalogue: Arc<AccessPointCatalogue>,
    levels: Vec<i32>,
}

impl WifiReadingTable {
    pub fn new(catalogue: Arc<AccessPointCatalogue>) -> Self {
        let levels = vec![0; catalogue.len()];
        Self { catalogue, levels }
    }

    pub fn catalogue(&self) -> &Arc<AccessPointCatalogue> {
        &self.catalogue
    }

    /// Mark every access point as not seen
    pub fn reset(&mut self) {
        self.levels.iter_mut().for_each(|level| *level = 0);
    }

    /// Switch to another building's catalogue, dropping all readings
    pub fn rekey(&mut self, catalogue: Arc<AccessPointCatalogue>) {
        debug!("Readings re-keyed to {} ({} access points)", catalogue.building(), catalogue.len());
        self.levels = vec![0; catalogue.len()];
        self.catalogue = catalogue;
    }

    /// Record a level; returns false when the access point is not catalogued
    pub fn record(&mut self, bssid: &Bssid, level: i32) -> bool {
        match self.catalogue.slot(bssid) {
            Some(slot) => {
                self.levels[slot] = level;
                true
            }
            None => false,
        }
    }

    /// Record every catalogued access point of a scan, returning how many were kept
    ///
    /// Malformed addresses are skipped like unknown ones.
    pub fn record_scan(&mut self, observations: &[ScanObservation]) -> usize {
        observations
            .iter()
            .filter(|obs| {
                Bssid::parse(&obs.bssid)
                    .map(|bssid| self.record(&bssid, obs.level))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Level for an access point; `None` if it is not catalogued
    pub fn level(&self, bssid: &Bssid) -> Option<i32> {
        self.catalogue.slot(bssid).map(|slot| self.levels[slot])
    }

    /// Levels in catalogue slot order
    pub fn levels(&self) -> &[i32] {
        &self.levels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bssid, i32)> {
        self.catalogue.access_points().iter().zip(self.levels.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
