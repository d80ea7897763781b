//! The contract every pre-trained predictor satisfies

use wayfinder_core::{FeatureVector, PartitionLabel};

use crate::errors::PredictionError;

/// A pre-trained predictor: fingerprint in, scalar out
///
/// Regressors return a coordinate. Classifiers return a class index into
/// [`Model::class_labels`] (or, when they declare none, into the scheme's
/// canonical labels).
///
/// Implementations are shared across threads and never mutated after load.
pub trait Model: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError>;

    /// Number of input features the model was trained on
    fn num_features(&self) -> usize;

    /// Ordered class labels, for classifiers that declare them
    fn class_labels(&self) -> Option<&[PartitionLabel]> {
        None
    }
}

/// Look up a slot, distinguishing a missing value from a bad index
pub(crate) fn feature(features: &FeatureVector, index: usize) -> Result<Option<f64>, PredictionError> {
    features
        .values()
        .get(index)
        .copied()
        .ok_or(PredictionError::FeatureOutOfRange {
            index,
            len: features.len(),
        })
}
