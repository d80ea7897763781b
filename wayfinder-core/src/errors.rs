//! Error Types for Fingerprint Assembly
//!
//! Most "failures" in fingerprint assembly are not errors at all: a sensor that
//! has not reported yet reads as 0, an absent coarse location becomes three
//! missing feature slots, and a scan result for an unknown access point is
//! dropped. What remains here are configuration problems that a caller has to
//! act on:
//!
//! - `UnknownBuilding`: no catalogue is configured for the requested building
//! - `InvalidBssid`: a catalogue or scan entry is not a MAC address
//! - `DuplicateBssid`: a catalogue lists the same access point twice
//! - `Config`/`Io`/`Json`: configuration files could not be read or parsed

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while configuring fingerprint assembly
#[derive(Error, Debug)]
pub enum CoreError {
    /// No access point catalogue exists for this building
    #[error("No access point catalogue for building '{0}'")]
    UnknownBuilding(String),

    /// String is not a colon separated 6-byte MAC address
    #[error("Invalid BSSID '{0}': expected aa:bb:cc:dd:ee:ff")]
    InvalidBssid(String),

    /// Catalogue lists the same BSSID twice, which would alias two feature slots
    #[error("BSSID {bssid} listed twice in catalogue for '{building}'")]
    DuplicateBssid {
        /// Building whose catalogue is malformed
        building: String,
        /// Offending access point
        bssid: String,
    },

    /// Configuration value is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading a configuration file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for the expected document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
