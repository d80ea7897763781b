//! On-disk model resources
//!
//! Each resource is one JSON document tagged by `kind`:
//!
//! ```json
//! {"kind": "forest",   "num_features": 172, "classes": ["upperleft", ...], "trees": [...]}
//! {"kind": "instance", "num_features": 172, "k": 3, "instances": [...]}
//! {"kind": "constant", "num_features": 172, "value": 12.5}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use wayfinder_core::{FeatureVector, PartitionLabel};

use crate::errors::{MlError, MlResult, PredictionError};
use crate::forest::RandomForest;
use crate::model::Model;
use crate::neighbours::InstanceRegressor;

/// Fixed output, for baselines and degenerate partitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantModel {
    pub num_features: usize,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<PartitionLabel>,
}

impl Model for ConstantModel {
    fn predict(&self, _features: &FeatureVector) -> Result<f64, PredictionError> {
        Ok(self.value)
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn class_labels(&self) -> Option<&[PartitionLabel]> {
        (!self.classes.is_empty()).then_some(self.classes.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedModel {
    Forest(RandomForest),
    Instance(InstanceRegressor),
    Constant(ConstantModel),
}

impl SerializedModel {
    /// Read, parse and structurally validate a model resource
    pub fn load(path: &Path) -> MlResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| MlError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let format_error = |reason: String| MlError::Format {
            path: path.to_path_buf(),
            reason,
        };

        let model: Self = serde_json::from_str(&text).map_err(|e| format_error(e.to_string()))?;
        model.validate().map_err(format_error)?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            SerializedModel::Forest(forest) => forest.validate(),
            SerializedModel::Instance(knn) => knn.validate(),
            SerializedModel::Constant(constant) if !constant.value.is_finite() => {
                Err("constant value is not finite".into())
            }
            SerializedModel::Constant(_) => Ok(()),
        }
    }

    fn inner(&self) -> &dyn Model {
        match self {
            SerializedModel::Forest(forest) => forest,
            SerializedModel::Instance(knn) => knn,
            SerializedModel::Constant(constant) => constant,
        }
    }
}

impl Model for SerializedModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        self.inner().predict(features)
    }

    fn num_features(&self) -> usize {
        self.inner().num_features()
    }

    fn class_labels(&self) -> Option<&[PartitionLabel]> {
        self.inner().class_labels()
    }
}
