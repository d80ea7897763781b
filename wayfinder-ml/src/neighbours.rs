//! Instance-based (nearest neighbour) regression
//!
//! Stores training fingerprints verbatim. Distance is the root mean squared
//! difference over the slots present in *both* the query and the instance,
//! so missing location fields simply drop out of the comparison. The `k`
//! nearest instances vote with weight `1 / distance`; exact matches win
//! outright.

use serde::{Deserialize, Serialize};
use wayfinder_core::FeatureVector;

use crate::errors::PredictionError;
use crate::model::Model;

/// One stored training fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub features: Vec<Option<f64>>,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRegressor {
    pub num_features: usize,
    #[serde(default = "default_k")]
    pub k: usize,
    pub instances: Vec<Instance>,
}

fn default_k() -> usize {
    1
}

impl InstanceRegressor {
    pub fn new(num_features: usize, k: usize, instances: Vec<Instance>) -> Self {
        Self {
            num_features,
            k,
            instances,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.k == 0 {
            return Err("k must be at least 1".into());
        }
        if self.instances.is_empty() {
            return Err("no stored instances".into());
        }
        match self.instances.iter().position(|i| i.features.len() != self.num_features) {
            Some(bad) => Err(format!("instance {bad} does not have {} features", self.num_features)),
            None => Ok(()),
        }
    }

    fn distance(query: &[Option<f64>], instance: &[Option<f64>]) -> Option<f64> {
        let (sum, shared) = query
            .iter()
            .zip(instance)
            .filter_map(|(q, i)| Some((q.as_ref()? - i.as_ref()?).powi(2)))
            .fold((0.0, 0usize), |(sum, n), sq| (sum + sq, n + 1));

        (shared > 0).then(|| (sum / shared as f64).sqrt())
    }
}

impl Model for InstanceRegressor {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        if features.len() < self.num_features {
            return Err(PredictionError::FeatureOutOfRange {
                index: self.num_features - 1,
                len: features.len(),
            });
        }

        let query = &features.values()[..self.num_features];
        let mut neighbours: Vec<(f64, f64)> = self
            .instances
            .iter()
            .filter_map(|inst| Self::distance(query, &inst.features).map(|d| (d, inst.target)))
            .collect();

        if neighbours.is_empty() {
            return Err(PredictionError::Failed("no instance shares a feature with the query".into()));
        }

        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbours.truncate(self.k);

        let exact: Vec<f64> = neighbours.iter().filter(|(d, _)| *d == 0.0).map(|(_, t)| *t).collect();
        if !exact.is_empty() {
            return Ok(exact.iter().sum::<f64>() / exact.len() as f64);
        }

        let (weighted, weights) = neighbours
            .iter()
            .fold((0.0, 0.0), |(acc, w), (d, target)| (acc + target / d, w + 1.0 / d));
        Ok(weighted / weights)
    }

    fn num_features(&self) -> usize {
        self.num_features
    }
}
