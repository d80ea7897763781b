//! Decision tree evaluation
//!
//! Nodes live in a flat array with the root at index 0. Trees are trained
//! elsewhere and only evaluated here, so the structure is validated once at
//! load and evaluation can assume well-formed indices.

use serde::{Deserialize, Serialize};
use wayfinder_core::FeatureVector;

use crate::errors::PredictionError;
use crate::node::Node;

/// Binary decision tree in array representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Check child indices, split features and leaf widths
    ///
    /// Children must have a larger index than their parent, which also rules
    /// out cycles.
    pub fn validate(&self, num_features: usize, output_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature, left, right, ..
                } => {
                    if *feature >= num_features {
                        return Err(format!("node {i} splits on feature {feature} of {num_features}"));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
                Node::Leaf { output } => {
                    if output.len() != output_len {
                        return Err(format!("leaf {i} has {} outputs, expected {output_len}", output.len()));
                    }
                }
            }
        }

        Ok(())
    }

    /// Walk from the root to the leaf this fingerprint falls into
    pub fn leaf(&self, features: &FeatureVector) -> Result<&[f64], PredictionError> {
        let mut current_index = 0;

        // A validated tree reaches a leaf in at most `nodes.len()` steps
        for _ in 0..=self.nodes.len() {
            let node = self
                .nodes
                .get(current_index)
                .ok_or_else(|| PredictionError::Failed(format!("dangling child index {current_index}")))?;

            match node {
                Node::Leaf { output } => return Ok(output),
                Node::Split { .. } => current_index = node.traverse(features)?,
            }
        }

        Err(PredictionError::Failed("tree walk did not terminate".into()))
    }

    /// Get the number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
