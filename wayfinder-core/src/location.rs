//! Optional coarse outdoor location
//!
//! An absent location is the common case indoors, not an error. It becomes
//! three *missing* feature slots so the models' missing-value handling
//! applies instead of a false zero.

use log::debug;
use serde::{Deserialize, Serialize};

/// Latitude/longitude fix with its reported accuracy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoarseLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters
    pub accuracy: f32,
}

impl CoarseLocation {
    pub fn new(latitude: f64, longitude: f64, accuracy: f32) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }
}

/// Platform location providers that can be queried for a cached fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationProvider {
    Gps,
    Network,
}

/// Pull-based access to the platform's last known fixes
pub trait LocationSource: Send + Sync {
    fn last_known(&self, provider: LocationProvider) -> Option<CoarseLocation>;
}

/// Source that never has a fix
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationSource for NoLocation {
    fn last_known(&self, _provider: LocationProvider) -> Option<CoarseLocation> {
        None
    }
}

/// Most recent pushed location, with pull-based fallback
#[derive(Debug, Clone, Default)]
pub struct LocationState {
    current: Option<CoarseLocation>,
}

impl LocationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pushed "location changed" fix
    pub fn update(&mut self, location: CoarseLocation) {
        self.current = Some(location);
    }

    pub fn current(&self) -> Option<CoarseLocation> {
        self.current
    }

    /// Location to use for the next fingerprint
    ///
    /// Without a pushed fix, providers are queried in `fallback` order and
    /// the first hit is cached as the current location.
    pub fn resolve(
        &mut self,
        source: &dyn LocationSource,
        fallback: &[LocationProvider],
    ) -> Option<CoarseLocation> {
        if self.current.is_none() {
            self.current = Self::query(source, fallback);
        }
        self.current
    }

    /// First last-known fix among `fallback` providers
    ///
    /// Touches no state, so callers can query the platform without holding
    /// whatever guards the `LocationState`.
    pub fn query(source: &dyn LocationSource, fallback: &[LocationProvider]) -> Option<CoarseLocation> {
        fallback.iter().find_map(|&provider| {
            let fix = source.last_known(provider);
            if fix.is_some() {
                debug!("Using last known {provider:?} location");
            }
            fix
        })
    }

    /// Cache a queried fix unless a location arrived in the meantime
    pub fn cache(&mut self, fix: Option<CoarseLocation>) -> Option<CoarseLocation> {
        if self.current.is_none() {
            self.current = fix;
        }
        self.current
    }
}
