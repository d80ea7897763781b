//! Decision tree node
//!
//! Trees are stored as flat node arrays; children are referenced by index.
//! Each split also records which way a *missing* feature value goes, so a
//! fingerprint without a coarse location still reaches a leaf.

use serde::{Deserialize, Serialize};
use wayfinder_core::FeatureVector;

use crate::errors::PredictionError;
use crate::model::feature;

/// Node type in the decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Internal node with split condition
    Split {
        /// Feature index to split on
        feature: usize,
        /// Values strictly below go left
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
        /// Branch taken when the feature is missing
        #[serde(default)]
        missing: Branch,
    },
    /// Leaf: one value for regression trees, a class distribution otherwise
    Leaf { output: Vec<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    #[default]
    Left,
    Right,
    /// No default; a missing value fails the prediction
    Fail,
}

impl Node {
    /// Create a split node that sends missing values left
    pub fn split(feature: usize, threshold: f64, left: usize, right: usize) -> Self {
        Node::Split {
            feature,
            threshold,
            left,
            right,
            missing: Branch::Left,
        }
    }

    pub fn leaf(output: Vec<f64>) -> Self {
        Node::Leaf { output }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Child index to visit next
    pub fn traverse(&self, features: &FeatureVector) -> Result<usize, PredictionError> {
        match self {
            Node::Split {
                feature: index,
                threshold,
                left,
                right,
                missing,
            } => {
                let next = match feature(features, *index)? {
                    Some(value) if value < *threshold => *left,
                    Some(_) => *right,
                    None => match missing {
                        Branch::Left => *left,
                        Branch::Right => *right,
                        Branch::Fail => return Err(PredictionError::MissingFeature(*index)),
                    },
                };
                Ok(next)
            }
            Node::Leaf { .. } => Err(PredictionError::Failed("cannot traverse from leaf node".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_core::Task;

    fn vector(values: &[Option<f64>]) -> FeatureVector {
        FeatureVector::new(values.to_vec(), Task::XPosition)
    }

    #[test]
    fn test_node_creation() {
        assert!(!Node::split(0, 25.0, 1, 2).is_leaf());
        assert!(Node::leaf(vec![1.0]).is_leaf());
    }

    #[test]
    fn test_node_traverse() {
        let node = Node::split(0, 25.0, 1, 2);

        assert_eq!(node.traverse(&vector(&[Some(20.0)])).unwrap(), 1);
        assert_eq!(node.traverse(&vector(&[Some(25.0)])).unwrap(), 2);
    }

    #[test]
    fn missing_value_follows_default_branch() {
        let node = Node::Split {
            feature: 1,
            threshold: 0.0,
            left: 1,
            right: 2,
            missing: Branch::Right,
        };
        assert_eq!(node.traverse(&vector(&[Some(1.0), None])).unwrap(), 2);

        let strict = Node::Split {
            feature: 1,
            threshold: 0.0,
            left: 1,
            right: 2,
            missing: Branch::Fail,
        };
        assert_eq!(strict.traverse(&vector(&[Some(1.0), None])), Err(PredictionError::MissingFeature(1)));
        assert_eq!(strict.traverse(&vector(&[Some(1.0), Some(-1.0)])), Ok(1));
    }

    #[test]
    fn out_of_range_feature_is_an_error() {
        let node = Node::split(5, 0.0, 1, 2);
        assert_eq!(
            node.traverse(&vector(&[Some(1.0)])),
            Err(PredictionError::FeatureOutOfRange { index: 5, len: 1 })
        );
        assert!(Node::leaf(vec![0.0]).traverse(&vector(&[])).is_err());
    }
}
