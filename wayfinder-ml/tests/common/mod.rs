//! Shared fixtures for wayfinder-ml integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use wayfinder_core::{AccessPointCatalogue, FeatureSchema, PartitionScheme};
use wayfinder_ml::{ModelKey, ModelRegistry, PositionUpdate, ResultSink, SerializedModel};

pub const LAB_APS: [&str; 2] = ["AA:AA:AA:AA:AA:01", "AA:AA:AA:AA:AA:02"];

pub fn lab_catalogue() -> Arc<AccessPointCatalogue> {
    Arc::new(AccessPointCatalogue::new("Lab", &LAB_APS).unwrap())
}

pub fn lab_schema() -> FeatureSchema {
    FeatureSchema::for_catalogue(&lab_catalogue())
}

/// Write a model document into a building's scheme directory
pub fn write_model(root: &Path, scheme: PartitionScheme, key: &ModelKey, model: &SerializedModel) {
    let dir = ModelRegistry::resource_dir(root, "Lab", scheme);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(key.file_name()), serde_json::to_string_pretty(model).unwrap()).unwrap();
}

#[derive(Default)]
pub struct CollectingSink {
    pub updates: Mutex<Vec<PositionUpdate>>,
}

impl ResultSink for CollectingSink {
    fn publish(&self, update: &PositionUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}
