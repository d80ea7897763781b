//! Pre-trained position models for Wayfinder
//!
//! ## Overview
//!
//! Positioning is a two-stage model hierarchy trained offline:
//!
//! ```text
//! fingerprint ──→ partition classifier ──→ "middle"
//!                                            │
//!                     ┌──────────────────────┴─────────┐
//!                     ▼                                ▼
//!              middle x regressor               middle y regressor
//!                     │                                │
//!                     └────────────→ (x, y) ←──────────┘
//! ```
//!
//! A partition narrows the floor to a region small enough that a dedicated
//! regressor pair stays accurate; the classifier only needs to be right
//! about the coarse region.
//!
//! ## Model Formats
//!
//! Models are JSON documents (see [`serialized`]). This crate evaluates
//! them and never trains or writes them:
//!
//! | Kind       | Output                                   |
//! |------------|------------------------------------------|
//! | `forest`   | class index (arg-max) or mean leaf value |
//! | `instance` | inverse-distance weighted k-NN target    |
//! | `constant` | fixed value                              |
//!
//! ## Failure Model
//!
//! Loading and prediction never fail the caller. A slot that fails to load
//! stays empty; a prediction that errors or panics drops that one output.
//! See [`pipeline`] for how a cycle degrades.

#![deny(unsafe_code)]

pub mod errors;
pub mod forest;
pub mod model;
pub mod neighbours;
pub mod node;
pub mod pipeline;
pub mod registry;
pub mod serialized;
pub mod tree;

pub use errors::{MlError, MlResult, PredictionError};
pub use forest::RandomForest;
pub use model::Model;
pub use neighbours::{Instance, InstanceRegressor};
pub use node::{Branch, Node};
pub use pipeline::{CycleOutcome, InferencePipeline, PipelineState, PositionUpdate, ResultSink, StateHandle};
pub use registry::{LoadReport, ModelKey, ModelRegistry};
pub use serialized::{ConstantModel, SerializedModel};
pub use tree::DecisionTree;
