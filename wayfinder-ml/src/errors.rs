//! Error types for model loading and invocation
//!
//! Two families, kept apart because they are handled at different points:
//!
//! - [`MlError`]: a model resource could not be loaded. Captured per slot in
//!   the registry's load report; the slot stays empty for the process lifetime.
//! - [`PredictionError`]: a loaded model could not produce an output for one
//!   fingerprint. Isolated to that invocation; the next scan is a fresh try.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for model loading
pub type MlResult<T> = Result<T, MlError>;

#[derive(Error, Debug)]
pub enum MlError {
    /// Model resource could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model resource is not a valid model document
    #[error("Malformed model {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// Model was trained against a different feature layout
    #[error("Model {path} expects {found} features, schema has {expected}")]
    SchemaMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// Why a single model invocation produced no value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    /// Model needs a feature the vector marks as missing and has no fallback
    #[error("Feature {0} is missing")]
    MissingFeature(usize),

    /// Model refers to a slot beyond the vector's length
    #[error("Feature index {index} out of range for vector of {len}")]
    FeatureOutOfRange { index: usize, len: usize },

    /// Classifier output does not name one of its declared classes
    #[error("Class index {0} is not a declared class")]
    UnknownClass(f64),

    /// Model failed internally
    #[error("Prediction failed: {0}")]
    Failed(String),
}
