//! Shared fixtures for wayfinder-tracker integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use wayfinder_core::{FeatureVector, PartitionLabel, PartitionScheme, ScanObservation, TrackerConfig};
use wayfinder_ml::{ConstantModel, Model, ModelKey, ModelRegistry, PredictionError, SerializedModel};
use wayfinder_tracker::{ScanCompletion, ScanDisposition, ScanPort, ScanToken, Tracker};

pub const LAB_APS: [&str; 2] = ["aa:aa:aa:aa:aa:01", "aa:aa:aa:aa:aa:02"];
pub const HALL_APS: [&str; 3] = ["bb:bb:bb:bb:bb:01", "bb:bb:bb:bb:bb:02", "bb:bb:bb:bb:bb:03"];

/// 13 sensors + access points + 3 location slots
pub const fn feature_count(access_points: usize) -> usize {
    13 + access_points + 3
}

/// Mid-2015, the era of the original survey walks
pub const START_MS: u64 = 1_434_000_000_123;

/// Records every scan request; refuses while `refuse` is set
#[derive(Default)]
pub struct StubScanner {
    pub refuse: AtomicBool,
    pub requested: Mutex<Vec<ScanToken>>,
}

impl StubScanner {
    pub fn last_token(&self) -> ScanToken {
        *self.requested.lock().unwrap().last().expect("no scan requested")
    }

    pub fn request_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

impl ScanPort for StubScanner {
    fn start_scan(&self, token: ScanToken) -> bool {
        self.requested.lock().unwrap().push(token);
        !self.refuse.load(Ordering::SeqCst)
    }
}

/// Deliver a scan for the outstanding token, retrying while the worker is busy
pub fn complete_scan(tracker: &mut Tracker, scanner: &StubScanner, results: &[ScanObservation]) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let completion = ScanCompletion::new(Some(scanner.last_token()), results.to_vec());
        match tracker.on_scan_completed(completion) {
            ScanDisposition::Accepted => return,
            ScanDisposition::Dropped if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(1)),
            other => panic!("scan not accepted: {other:?}"),
        }
    }
}

/// Catalogue document with the two test buildings
pub fn write_catalogues(dir: &Path) -> PathBuf {
    let path = dir.join("catalogues.json");
    let document = json!({
        "version": 1,
        "buildings": [
            {"id": "Lab", "access_points": LAB_APS},
            {"id": "Hall", "access_points": HALL_APS},
        ]
    });
    std::fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
    path
}

pub fn write_model(models: &Path, building: &str, scheme: PartitionScheme, key: &ModelKey, model: &SerializedModel) {
    let dir = ModelRegistry::resource_dir(models, building, scheme);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(key.file_name()), serde_json::to_string(model).unwrap()).unwrap();
}

pub fn constant(num_features: usize, value: f64) -> SerializedModel {
    SerializedModel::Constant(ConstantModel {
        num_features,
        value,
        classes: Vec::new(),
    })
}

/// Five-partition model set whose classifier always answers `middle`
pub fn write_middle_models(models: &Path, building: &str, access_points: usize, x: f64, y: f64) {
    let scheme = PartitionScheme::FivePartition;
    let num_features = feature_count(access_points);
    let classes: Vec<PartitionLabel> = scheme.canonical_labels().unwrap();
    let middle = PartitionLabel::new("middle");

    let classifier = SerializedModel::Constant(ConstantModel {
        num_features,
        value: 2.0,
        classes,
    });
    write_model(models, building, scheme, &ModelKey::Partition, &classifier);
    write_model(models, building, scheme, &ModelKey::X(middle.clone()), &constant(num_features, x));
    write_model(models, building, scheme, &ModelKey::Y(middle), &constant(num_features, y));
}

/// Configuration rooted in a scratch directory, tracking the Lab
pub fn config(dir: &Path) -> TrackerConfig {
    TrackerConfig::default()
        .with_building("Lab")
        .with_partition_scheme(PartitionScheme::FivePartition)
        .with_catalogue_path(write_catalogues(dir))
        .with_models_dir(dir.join("models"))
        .with_log_dir(dir.join("logs"))
}

/// Shared state of a [`GatedModel`]: counts calls and holds them until released
#[derive(Default)]
pub struct Gate {
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    open: Mutex<bool>,
    released: Condvar,
}

impl Gate {
    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.released.notify_all();
    }

    /// Wait until `n` calls have entered the model
    pub fn wait_for_calls(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.calls.load(Ordering::SeqCst) < n {
            assert!(Instant::now() < deadline, "model never called");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Regressor that blocks inside `predict` until its gate opens
pub struct GatedModel {
    pub gate: Arc<Gate>,
    pub value: f64,
    pub num_features: usize,
}

impl Model for GatedModel {
    fn predict(&self, _features: &FeatureVector) -> Result<f64, PredictionError> {
        let gate = &self.gate;
        gate.calls.fetch_add(1, Ordering::SeqCst);
        let active = gate.active.fetch_add(1, Ordering::SeqCst) + 1;
        gate.max_active.fetch_max(active, Ordering::SeqCst);

        let mut open = gate.open.lock().unwrap();
        while !*open {
            open = gate.released.wait(open).unwrap();
        }
        drop(open);

        gate.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.value)
    }

    fn num_features(&self) -> usize {
        self.num_features
    }
}

/// Full-scheme Lab models: x blocks on `gate` then answers 4, y answers 9
pub fn gated_registry(gate: Arc<Gate>) -> Arc<ModelRegistry> {
    let num_features = feature_count(LAB_APS.len());
    let full = PartitionLabel::full();

    let mut registry = ModelRegistry::new("Lab", PartitionScheme::Full);
    registry.insert(
        ModelKey::X(full.clone()),
        Box::new(GatedModel {
            gate,
            value: 4.0,
            num_features,
        }),
    );
    registry.insert(
        ModelKey::Y(full),
        Box::new(ConstantModel {
            num_features,
            value: 9.0,
            classes: Vec::new(),
        }),
    );
    Arc::new(registry)
}
