//! Keyed store of the pre-trained models for one building
//!
//! ## Resource layout
//!
//! ```text
//! <root>/<building>/<scheme>/model_partition.json
//!                           /model_x_<label>.json
//!                           /model_y_<label>.json
//! ```
//!
//! Every slot loads independently. A failed slot is recorded in the
//! [`LoadReport`] and stays empty for the lifetime of the registry; the
//! pipeline skips whatever needs it. After loading the registry is shared
//! read-only behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use wayfinder_core::{FeatureSchema, PartitionLabel, PartitionScheme};

use crate::errors::MlError;
use crate::model::Model;
use crate::serialized::SerializedModel;

/// Identifies one model slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelKey {
    Partition,
    X(PartitionLabel),
    Y(PartitionLabel),
}

impl ModelKey {
    pub fn file_name(&self) -> String {
        match self {
            ModelKey::Partition => "model_partition.json".to_string(),
            ModelKey::X(label) => format!("model_x_{label}.json"),
            ModelKey::Y(label) => format!("model_y_{label}.json"),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKey::Partition => f.write_str("partition"),
            ModelKey::X(label) => write!(f, "{label}X"),
            ModelKey::Y(label) => write!(f, "{label}Y"),
        }
    }
}

/// Outcome of loading every slot
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ModelKey>,
    pub failed: Vec<(ModelKey, MlError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&self, key: &ModelKey) -> Option<&MlError> {
        self.failed.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} loaded, {} failed", self.loaded.len(), self.failed.len())?;
        for (key, error) in &self.failed {
            write!(f, "\n  {key}: {error}")?;
        }
        Ok(())
    }
}

/// Partition classifier plus per-partition x/y regressors for one building
pub struct ModelRegistry {
    building: String,
    scheme: PartitionScheme,
    labels: Vec<PartitionLabel>,
    models: HashMap<ModelKey, Box<dyn Model>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slots: Vec<String> = self.models.keys().map(ToString::to_string).collect();
        slots.sort();
        f.debug_struct("ModelRegistry")
            .field("building", &self.building)
            .field("scheme", &self.scheme)
            .field("labels", &self.labels)
            .field("slots", &slots)
            .finish()
    }
}

impl ModelRegistry {
    /// Empty registry; populate with [`ModelRegistry::insert`]
    pub fn new(building: impl Into<String>, scheme: PartitionScheme) -> Self {
        Self {
            building: building.into(),
            scheme,
            labels: scheme.canonical_labels().unwrap_or_default(),
            models: HashMap::new(),
        }
    }

    /// Replace the partition labels (for schemes whose labels the classifier defines)
    pub fn with_labels(mut self, labels: Vec<PartitionLabel>) -> Self {
        self.labels = labels;
        self
    }

    pub fn insert(&mut self, key: ModelKey, model: Box<dyn Model>) {
        self.models.insert(key, model);
    }

    /// Directory holding one building's resources for a scheme
    pub fn resource_dir(root: &Path, building: &str, scheme: PartitionScheme) -> PathBuf {
        root.join(building).join(scheme.dir_name())
    }

    /// Load every slot of a building's model set, never failing as a whole
    pub fn load_all(
        root: &Path,
        building: &str,
        scheme: PartitionScheme,
        schema: &FeatureSchema,
    ) -> (ModelRegistry, LoadReport) {
        let dir = Self::resource_dir(root, building, scheme);
        let mut registry = ModelRegistry::new(building, scheme);
        let mut report = LoadReport::default();

        if scheme.uses_classifier() {
            registry.load_slot(&dir, ModelKey::Partition, schema, &mut report);

            if registry.labels.is_empty() {
                registry.labels = registry
                    .get(&ModelKey::Partition)
                    .and_then(|c| c.class_labels())
                    .map(<[PartitionLabel]>::to_vec)
                    .unwrap_or_default();
            }
        }

        for label in registry.labels.clone() {
            registry.load_slot(&dir, ModelKey::X(label.clone()), schema, &mut report);
            registry.load_slot(&dir, ModelKey::Y(label), schema, &mut report);
        }

        if report.is_complete() {
            info!("Models for {building}/{}: {report}", scheme.dir_name());
        } else {
            warn!("Models for {building}/{}: {report}", scheme.dir_name());
        }

        (registry, report)
    }

    fn load_slot(&mut self, dir: &Path, key: ModelKey, schema: &FeatureSchema, report: &mut LoadReport) {
        let path = dir.join(key.file_name());

        let loaded = SerializedModel::load(&path).and_then(|model| {
            let found = model.num_features();
            if found != schema.len() {
                return Err(MlError::SchemaMismatch {
                    path: path.clone(),
                    expected: schema.len(),
                    found,
                });
            }
            if key == ModelKey::Partition && model.class_labels().is_none() && self.labels.is_empty() {
                return Err(MlError::Format {
                    path: path.clone(),
                    reason: "classifier declares no class labels".into(),
                });
            }
            Ok(model)
        });

        match loaded {
            Ok(model) => {
                self.models.insert(key.clone(), Box::new(model));
                report.loaded.push(key);
            }
            Err(error) => report.failed.push((key, error)),
        }
    }

    pub fn get(&self, key: &ModelKey) -> Option<&dyn Model> {
        self.models.get(key).map(|model| model.as_ref())
    }

    pub fn building(&self) -> &str {
        &self.building
    }

    pub fn scheme(&self) -> PartitionScheme {
        self.scheme
    }

    /// Partition labels with regressor slots
    pub fn labels(&self) -> &[PartitionLabel] {
        &self.labels
    }

    /// Labels the classifier's output indexes into
    pub fn class_labels(&self) -> &[PartitionLabel] {
        self.get(&ModelKey::Partition)
            .and_then(|c| c.class_labels())
            .unwrap_or(self.labels.as_slice())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
