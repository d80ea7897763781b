//! Random forest evaluation
//!
//! A forest with declared `classes` is a classifier: each leaf holds a class
//! distribution, distributions are averaged across trees and the index of
//! the most probable class is returned (ties go to the lower index). A
//! forest without classes is a regressor returning the mean leaf value.

use serde::{Deserialize, Serialize};
use wayfinder_core::{FeatureVector, PartitionLabel};

use crate::errors::PredictionError;
use crate::model::Model;
use crate::tree::DecisionTree;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub num_features: usize,
    /// Ordered class labels; empty for regression forests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<PartitionLabel>,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn regression(num_features: usize, trees: Vec<DecisionTree>) -> Self {
        Self {
            num_features,
            classes: Vec::new(),
            trees,
        }
    }

    pub fn classification(num_features: usize, classes: Vec<PartitionLabel>, trees: Vec<DecisionTree>) -> Self {
        Self {
            num_features,
            classes,
            trees,
        }
    }

    pub fn is_classifier(&self) -> bool {
        !self.classes.is_empty()
    }

    /// Width every leaf must have
    fn output_len(&self) -> usize {
        if self.is_classifier() {
            self.classes.len()
        } else {
            1
        }
    }

    /// Check every tree against the declared shape
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(i, tree)| {
                tree.validate(self.num_features, self.output_len())
                    .map_err(|reason| format!("tree {i}: {reason}"))
            })
    }

    fn average_leaves(&self, features: &FeatureVector) -> Result<Vec<f64>, PredictionError> {
        if self.trees.is_empty() {
            return Err(PredictionError::Failed("forest has no trees".into()));
        }

        let mut totals = vec![0.0; self.output_len()];
        for tree in &self.trees {
            let leaf = tree.leaf(features)?;
            for (total, value) in totals.iter_mut().zip(leaf) {
                *total += value;
            }
        }

        let count = self.trees.len() as f64;
        Ok(totals.into_iter().map(|total| total / count).collect())
    }
}

impl Model for RandomForest {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        let averaged = self.average_leaves(features)?;

        if !self.is_classifier() {
            return Ok(averaged[0]);
        }

        let mut best = 0;
        for (i, p) in averaged.iter().enumerate() {
            if *p > averaged[best] {
                best = i;
            }
        }
        Ok(best as f64)
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn class_labels(&self) -> Option<&[PartitionLabel]> {
        self.is_classifier().then_some(self.classes.as_slice())
    }
}
