//! Partition-then-regress inference cycle
//!
//! ## State machine
//!
//! ```text
//! Idle → BuildingFeatures → ClassifyingPartition → Regressing → Publishing → Idle
//!                                  │                    │
//!                                  │ no classifier /    │ neither axis
//!                                  │ classifier failed  │ produced a value
//!                                  └──────→ Idle ←──────┘
//! ```
//!
//! One cycle per completed scan. The classifier picks a partition label, the
//! label picks the x and y regressors. Each model call is isolated: an error
//! or panic inside a model loses that one output and nothing else.
//!
//! ## Partial results
//!
//! If only one axis regressor produces a value, the update is still
//! published; the other axis carries the last value this pipeline produced
//! for it (flagged as not fresh). Retained values are cleared when the
//! pipeline switches to another building's models.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use wayfinder_core::{FeatureVector, Fingerprint, PartitionLabel, TimeSource, Timestamp};

use crate::errors::PredictionError;
use crate::model::Model;
use crate::registry::{ModelKey, ModelRegistry};

/// Observable stage of the inference cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    BuildingFeatures = 1,
    ClassifyingPartition = 2,
    Regressing = 3,
    Publishing = 4,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::BuildingFeatures,
            2 => PipelineState::ClassifyingPartition,
            3 => PipelineState::Regressing,
            4 => PipelineState::Publishing,
            _ => PipelineState::Idle,
        }
    }
}

/// Shared view of a pipeline's current state, readable from any thread
#[derive(Debug, Clone, Default)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: PipelineState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// A position estimate, possibly partial
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub building: String,
    pub partition: PartitionLabel,
    /// Latest x; `None` until some cycle has produced one
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Whether `x` was produced by this cycle
    pub x_fresh: bool,
    pub y_fresh: bool,
    /// Inputs the estimate was computed from
    pub fingerprint: Arc<Fingerprint>,
    pub published_at: Timestamp,
}

impl PositionUpdate {
    pub fn scanned_at(&self) -> Timestamp {
        self.fingerprint.captured_at
    }

    pub fn is_partial(&self) -> bool {
        !(self.x_fresh && self.y_fresh)
    }
}

/// Receives every published estimate
///
/// Called on the inference thread; implementations must not block on I/O.
pub trait ResultSink: Send + Sync {
    fn publish(&self, update: &PositionUpdate);
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Published(PositionUpdate),
    /// No classifier loaded (or no models for the fingerprint's building)
    NoClassifier,
    ClassifierFailed,
    /// Both axis regressors were absent or failed
    NoRegressorOutput,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Published(u) => write!(f, "published {}: ({:?}, {:?})", u.partition, u.x, u.y),
            CycleOutcome::NoClassifier => f.write_str("no classifier"),
            CycleOutcome::ClassifierFailed => f.write_str("classifier failed"),
            CycleOutcome::NoRegressorOutput => f.write_str("no regressor output"),
        }
    }
}

pub struct InferencePipeline {
    registry: Arc<ModelRegistry>,
    sink: Arc<dyn ResultSink>,
    clock: Arc<dyn TimeSource>,
    state: StateHandle,
    retained: [Option<f64>; 2],
}

impl InferencePipeline {
    pub fn new(registry: Arc<ModelRegistry>, sink: Arc<dyn ResultSink>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            registry,
            sink,
            clock,
            state: StateHandle::default(),
            retained: [None; 2],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Route subsequent cycles to another model set
    pub fn set_registry(&mut self, registry: Arc<ModelRegistry>) {
        if registry.building() != self.registry.building() {
            self.retained = [None; 2];
        }
        self.registry = registry;
    }

    /// Run one full cycle for a captured fingerprint
    pub fn run_cycle(&mut self, fingerprint: &Fingerprint) -> CycleOutcome {
        let outcome = self.cycle(fingerprint);
        self.state.set(PipelineState::Idle);
        debug!("Cycle for scan at {}: {outcome}", fingerprint.captured_at);
        outcome
    }

    fn cycle(&mut self, fingerprint: &Fingerprint) -> CycleOutcome {
        self.state.set(PipelineState::BuildingFeatures);
        if fingerprint.building() != self.registry.building() {
            warn!(
                "Fingerprint for {} but models for {}; skipping",
                fingerprint.building(),
                self.registry.building()
            );
            return CycleOutcome::NoClassifier;
        }
        let features = fingerprint.features();

        self.state.set(PipelineState::ClassifyingPartition);
        let partition = if self.registry.scheme().uses_classifier() {
            let Some(classifier) = self.registry.get(&ModelKey::Partition) else {
                debug!("No partition classifier for {}", self.registry.building());
                return CycleOutcome::NoClassifier;
            };

            let classified = invoke(classifier, &features.partition)
                .and_then(|index| class_label(index, self.registry.class_labels()));
            match classified {
                Ok(label) => label,
                Err(e) => {
                    warn!("Partition classifier failed: {e}");
                    return CycleOutcome::ClassifierFailed;
                }
            }
        } else {
            PartitionLabel::full()
        };

        self.state.set(PipelineState::Regressing);
        let x = self.regress(ModelKey::X(partition.clone()), &features.x);
        let y = self.regress(ModelKey::Y(partition.clone()), &features.y);
        if x.is_none() && y.is_none() {
            return CycleOutcome::NoRegressorOutput;
        }

        self.state.set(PipelineState::Publishing);
        let [last_x, last_y] = self.retained;
        let update = PositionUpdate {
            building: self.registry.building().to_string(),
            partition,
            x: x.or(last_x),
            y: y.or(last_y),
            x_fresh: x.is_some(),
            y_fresh: y.is_some(),
            fingerprint: Arc::new(fingerprint.clone()),
            published_at: self.clock.now(),
        };
        self.retained = [update.x, update.y];
        self.sink.publish(&update);

        CycleOutcome::Published(update)
    }

    fn regress(&self, key: ModelKey, features: &FeatureVector) -> Option<f64> {
        let Some(model) = self.registry.get(&key) else {
            debug!("No {key} regressor; axis skipped");
            return None;
        };
        invoke(model, features)
            .map_err(|e| warn!("{key} regressor failed: {e}"))
            .ok()
    }
}

/// Call a model, turning panics and non-finite outputs into errors
fn invoke(model: &dyn Model, features: &FeatureVector) -> Result<f64, PredictionError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| model.predict(features)))
        .unwrap_or_else(|payload| Err(PredictionError::Failed(panic_message(payload.as_ref()))));

    match result {
        Ok(value) if !value.is_finite() => Err(PredictionError::Failed(format!("non-finite output {value}"))),
        other => other,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("model panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("model panicked: {msg}")
    } else {
        "model panicked".to_string()
    }
}

/// Map a classifier's class index onto its label
fn class_label(index: f64, labels: &[PartitionLabel]) -> Result<PartitionLabel, PredictionError> {
    let rounded = index.round();
    if rounded < 0.0 || rounded >= labels.len() as f64 {
        return Err(PredictionError::UnknownClass(index));
    }
    Ok(labels[rounded as usize].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wayfinder_core::{AccessPointCatalogue, FixedTime, PartitionScheme, SensorSnapshot, WifiReadingTable};

    use crate::serialized::ConstantModel;

    const FEATURES: usize = 17;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PositionUpdate>>);

    impl ResultSink for Recorder {
        fn publish(&self, update: &PositionUpdate) {
            self.0.lock().unwrap().push(update.clone());
        }
    }

    struct Failing;

    impl Model for Failing {
        fn predict(&self, _: &FeatureVector) -> Result<f64, PredictionError> {
            Err(PredictionError::Failed("boom".into()))
        }

        fn num_features(&self) -> usize {
            FEATURES
        }
    }

    struct Panicking;

    impl Model for Panicking {
        fn predict(&self, _: &FeatureVector) -> Result<f64, PredictionError> {
            panic!("corrupt model state")
        }

        fn num_features(&self) -> usize {
            FEATURES
        }
    }

    /// Records the pipeline state observed while it is being invoked
    struct StateProbe {
        handle: StateHandle,
        seen: Mutex<Vec<PipelineState>>,
        value: f64,
    }

    impl Model for StateProbe {
        fn predict(&self, _: &FeatureVector) -> Result<f64, PredictionError> {
            self.seen.lock().unwrap().push(self.handle.get());
            Ok(self.value)
        }

        fn num_features(&self) -> usize {
            FEATURES
        }
    }

    fn constant(value: f64) -> Box<dyn Model> {
        Box::new(ConstantModel {
            num_features: FEATURES,
            value,
            classes: Vec::new(),
        })
    }

    fn fingerprint(building: &str) -> Fingerprint {
        let catalogue = Arc::new(AccessPointCatalogue::new(building, &["aa:aa:aa:aa:aa:01"]).unwrap());
        Fingerprint::capture(&SensorSnapshot::default(), &WifiReadingTable::new(catalogue), None, 100)
    }

    fn pipeline(registry: ModelRegistry) -> (InferencePipeline, Arc<Recorder>) {
        let sink = Arc::new(Recorder::default());
        let pipeline = InferencePipeline::new(Arc::new(registry), sink.clone(), Arc::new(FixedTime::new(250)));
        (pipeline, sink)
    }

    fn five_partition() -> ModelRegistry {
        ModelRegistry::new("Lab", PartitionScheme::FivePartition)
    }

    #[test]
    fn missing_classifier_publishes_nothing() {
        let mut registry = five_partition();
        registry.insert(ModelKey::X("middle".into()), constant(1.0));
        let (mut pipeline, sink) = pipeline(registry);

        assert_eq!(pipeline.run_cycle(&fingerprint("Lab")), CycleOutcome::NoClassifier);
        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn classifier_errors_and_panics_are_contained() {
        let classifiers: [Box<dyn Model>; 4] = [Box::new(Failing), Box::new(Panicking), constant(9.0), constant(f64::NAN)];
        for classifier in classifiers {
            let mut registry = five_partition();
            registry.insert(ModelKey::Partition, classifier);
            let (mut pipeline, sink) = pipeline(registry);

            assert_eq!(pipeline.run_cycle(&fingerprint("Lab")), CycleOutcome::ClassifierFailed);
            assert!(sink.0.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn routes_to_classified_partition() {
        let mut registry = five_partition();
        registry.insert(ModelKey::Partition, constant(2.0));
        registry.insert(ModelKey::X("upperleft".into()), constant(-1.0));
        registry.insert(ModelKey::X("middle".into()), constant(51.0));
        registry.insert(ModelKey::Y("middle".into()), constant(32.0));
        let (mut pipeline, sink) = pipeline(registry);

        let CycleOutcome::Published(update) = pipeline.run_cycle(&fingerprint("Lab")) else {
            panic!("expected a published update");
        };

        assert_eq!(update.partition.as_str(), "middle");
        assert_eq!((update.x, update.y), (Some(51.0), Some(32.0)));
        assert!(!update.is_partial());
        assert_eq!(update.scanned_at(), 100);
        assert_eq!(update.published_at, 250);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn missing_axis_retains_previous_value() {
        let mut complete = five_partition();
        complete.insert(ModelKey::Partition, constant(0.0));
        complete.insert(ModelKey::X("upperleft".into()), constant(3.0));
        complete.insert(ModelKey::Y("upperleft".into()), constant(4.0));
        let (mut pipeline, _sink) = pipeline(complete);
        assert!(matches!(pipeline.run_cycle(&fingerprint("Lab")), CycleOutcome::Published(_)));

        let mut x_only = five_partition();
        x_only.insert(ModelKey::Partition, constant(0.0));
        x_only.insert(ModelKey::X("upperleft".into()), constant(5.0));
        x_only.insert(ModelKey::Y("upperleft".into()), Box::new(Failing));
        pipeline.set_registry(Arc::new(x_only));

        let CycleOutcome::Published(update) = pipeline.run_cycle(&fingerprint("Lab")) else {
            panic!("expected a partial update");
        };
        assert_eq!((update.x, update.y), (Some(5.0), Some(4.0)));
        assert!(update.x_fresh);
        assert!(!update.y_fresh);
        assert!(update.is_partial());
    }

    #[test]
    fn no_regressor_output_publishes_nothing() {
        let mut registry = five_partition();
        registry.insert(ModelKey::Partition, constant(1.0));
        registry.insert(ModelKey::X("lowerleft".into()), Box::new(Panicking));
        let (mut pipeline, sink) = pipeline(registry);

        assert_eq!(pipeline.run_cycle(&fingerprint("Lab")), CycleOutcome::NoRegressorOutput);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn full_scheme_skips_classification() {
        let mut registry = ModelRegistry::new("Lab", PartitionScheme::Full);
        registry.insert(ModelKey::X(PartitionLabel::full()), constant(7.0));
        let (mut pipeline, _sink) = pipeline(registry);

        let CycleOutcome::Published(update) = pipeline.run_cycle(&fingerprint("Lab")) else {
            panic!("expected an update");
        };
        assert_eq!(update.partition, PartitionLabel::full());
        assert_eq!((update.x, update.y), (Some(7.0), None));
    }

    #[test]
    fn foreign_building_fingerprint_is_skipped() {
        let mut registry = five_partition();
        registry.insert(ModelKey::Partition, constant(0.0));
        let (mut pipeline, _sink) = pipeline(registry);

        assert_eq!(pipeline.run_cycle(&fingerprint("Elsewhere")), CycleOutcome::NoClassifier);
    }

    #[test]
    fn state_is_observable_during_cycle() {
        let (mut pipeline, _sink) = pipeline(five_partition());
        let handle = pipeline.state_handle();

        let probe = |value| StateProbe {
            handle: handle.clone(),
            seen: Mutex::new(Vec::new()),
            value,
        };
        let classifier = Arc::new(probe(2.0));
        let regressor = Arc::new(probe(1.0));

        struct Shared(Arc<StateProbe>);
        impl Model for Shared {
            fn predict(&self, f: &FeatureVector) -> Result<f64, PredictionError> {
                self.0.predict(f)
            }
            fn num_features(&self) -> usize {
                FEATURES
            }
        }

        let mut registry = five_partition();
        registry.insert(ModelKey::Partition, Box::new(Shared(classifier.clone())));
        registry.insert(ModelKey::X("middle".into()), Box::new(Shared(regressor.clone())));
        pipeline.set_registry(Arc::new(registry));

        pipeline.run_cycle(&fingerprint("Lab"));

        assert_eq!(*classifier.seen.lock().unwrap(), vec![PipelineState::ClassifyingPartition]);
        assert_eq!(*regressor.seen.lock().unwrap(), vec![PipelineState::Regressing]);
        assert_eq!(handle.get(), PipelineState::Idle);
    }

    #[test]
    fn class_index_rounding() {
        let labels: Vec<PartitionLabel> = vec!["a".into(), "b".into()];
        assert_eq!(class_label(0.9999, &labels).unwrap().as_str(), "b");
        assert!(class_label(-0.7, &labels).is_err());
        assert!(class_label(2.0, &labels).is_err());
    }
}
