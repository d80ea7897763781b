//! Tracker facade
//!
//! Owns the live readings and wires the platform collaborators to the
//! inference worker:
//!
//! ```text
//! on_sensor_event ───→ SensorSnapshot ─┐
//! on_location_changed → LocationState ─┼─ scan completes → Fingerprint ─→ worker
//! on_scan_completed ──→ WifiReadingTable┘                                   │
//!                                             LatestPosition ← FanOut ←──────┘
//!                                             InstrumentationLog ←┘
//! ```
//!
//! All readings live behind one mutex. A cycle copies them into a
//! [`Fingerprint`] while holding the lock, so it never sees a half-applied
//! building switch. The platform location provider is queried before the
//! lock is taken.
//!
//! Every scan the tracker acts on is written to the values log before it is
//! offered to the worker, whether the worker takes it or drops it.
//!
//! Model sets are loaded once per building on first use and kept for the
//! lifetime of the tracker.
//!
//! [`Tracker::stop`] never waits for a model: the stopped session's worker
//! finishes its cycle in the background. [`Tracker::join`] waits for those
//! cycles and flushes their logs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use wayfinder_core::{
    AccessPointCatalogue, CatalogueSet, CoarseLocation, FeatureSchema, Fingerprint, LocationSource, LocationState,
    NoLocation, OrientationSource, ScanObservation, SensorEvent, SensorSnapshot, SystemTime, TimeSource, TrackerConfig,
    WifiReadingTable,
};
use wayfinder_ml::{InferencePipeline, ModelRegistry, PipelineState, PositionUpdate, ResultSink};

use crate::errors::{TrackerError, TrackerResult};
use crate::instrumentation::InstrumentationLog;
use crate::lock;
use crate::scan::{ScanCompletion, ScanDisposition, ScanOrchestrator, ScanPort, ScanStats, ScanToken, ScanTrigger};
use crate::sink::{FanOut, LatestPosition};
use crate::worker::{CycleJob, InferenceWorker, WorkerHandle};

/// Readings shared between the control thread and the scan trigger
struct ControlState {
    snapshot: SensorSnapshot,
    readings: WifiReadingTable,
    location: LocationState,
    registry: Arc<ModelRegistry>,
}

/// Everything that exists only between `start` and `stop`
struct Session {
    scanner: ScanOrchestrator,
    worker: InferenceWorker,
    log: Arc<InstrumentationLog>,
}

/// A stopped session whose worker may still be finishing a cycle
struct Retired {
    worker: InferenceWorker,
    log: Arc<InstrumentationLog>,
}

pub struct Tracker {
    config: TrackerConfig,
    catalogues: CatalogueSet,
    port: Arc<dyn ScanPort>,
    clock: Arc<dyn TimeSource>,
    location_source: Arc<dyn LocationSource>,
    orientation: Option<Arc<dyn OrientationSource>>,
    observers: Vec<Arc<dyn ResultSink>>,
    registries: HashMap<String, Arc<ModelRegistry>>,
    control: Arc<Mutex<ControlState>>,
    latest: LatestPosition,
    next_token: ScanToken,
    session: Option<Session>,
    retired: Vec<Retired>,
}

impl Tracker {
    /// Select the configured building and load its models
    pub fn new(config: TrackerConfig, port: Arc<dyn ScanPort>) -> TrackerResult<Self> {
        config.validate()?;
        let catalogues = config.catalogues()?;
        let catalogue = catalogues.select(&config.building)?;

        let mut registries = HashMap::new();
        let registry = load_registry(&config, &catalogue);
        registries.insert(config.building.clone(), registry.clone());

        let control = ControlState {
            snapshot: SensorSnapshot::default(),
            readings: WifiReadingTable::new(catalogue),
            location: LocationState::new(),
            registry,
        };

        Ok(Self {
            config,
            catalogues,
            port,
            clock: Arc::new(SystemTime),
            location_source: Arc::new(NoLocation),
            orientation: None,
            observers: Vec::new(),
            registries,
            control: Arc::new(Mutex::new(control)),
            latest: LatestPosition::new(),
            next_token: ScanToken(0),
            session: None,
            retired: Vec::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Platform provider queried when no location has been pushed
    pub fn with_location_source(mut self, source: Arc<dyn LocationSource>) -> Self {
        self.location_source = source;
        self
    }

    pub fn with_orientation_source(mut self, source: Arc<dyn OrientationSource>) -> Self {
        self.orientation = Some(source);
        self
    }

    /// Additional sink receiving every published estimate
    pub fn with_observer(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.observers.push(sink);
        self
    }

    /// Use `registry` for its building instead of loading from `models_dir`
    pub fn with_models(mut self, registry: Arc<ModelRegistry>) -> Self {
        let building = registry.building().to_string();
        if building == self.config.building {
            lock(&self.control).registry = registry.clone();
        }
        self.registries.insert(building, registry);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn building(&self) -> &str {
        &self.config.building
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn on_sensor_event(&self, event: &SensorEvent) {
        let mut state = lock(&self.control);
        state.snapshot.apply(event, self.orientation.as_deref());
    }

    pub fn on_location_changed(&self, location: CoarseLocation) {
        lock(&self.control).location.update(location);
    }

    /// Switch building: new catalogue, zeroed readings, that building's models
    ///
    /// A cycle already in flight finishes with what it started with.
    pub fn select_building(&mut self, building: &str) -> TrackerResult<()> {
        let catalogue = self.catalogues.select(building)?;
        let registry = match self.registries.get(building) {
            Some(registry) => registry.clone(),
            None => {
                let config = self.config.clone().with_building(building);
                let registry = load_registry(&config, &catalogue);
                self.registries.insert(building.to_string(), registry.clone());
                registry
            }
        };

        {
            let mut state = lock(&self.control);
            state.readings.rekey(catalogue);
            state.registry = registry;
        }

        info!("Building switched from {} to {building}", self.config.building);
        self.config.building = building.to_string();
        Ok(())
    }

    /// Open the instrumentation log, start the worker and request the first scan
    ///
    /// Returns the token of the first scan, `None` if the platform refused it.
    pub fn start(&mut self) -> TrackerResult<Option<ScanToken>> {
        if self.session.is_some() {
            return Err(TrackerError::AlreadyRunning);
        }

        let log = Arc::new(InstrumentationLog::open(&self.config.log_dir)?);
        let mut sinks = FanOut::new()
            .with(Arc::new(self.latest.clone()))
            .with(log.clone());
        for observer in &self.observers {
            sinks = sinks.with(observer.clone());
        }

        let registry = lock(&self.control).registry.clone();
        let pipeline = InferencePipeline::new(registry, Arc::new(sinks), self.clock.clone());
        let worker = InferenceWorker::spawn(pipeline)?;

        let trigger = self.trigger(worker.handle(), log.clone());
        let mut scanner = ScanOrchestrator::new(self.port.clone(), trigger).with_first_token(self.next_token);
        info!("Tracking started in {}", self.config.building);
        let first = scanner.start();

        self.session = Some(Session { scanner, worker, log });
        Ok(first)
    }

    /// Platform callback for a delivered scan
    pub fn on_scan_completed(&mut self, completion: ScanCompletion) -> ScanDisposition {
        match self.session.as_mut() {
            Some(session) => session.scanner.on_scan_completed(completion),
            None => {
                debug!("Scan completion while stopped");
                ScanDisposition::Ignored
            }
        }
    }

    /// Stop scanning without waiting for the worker
    ///
    /// An in-flight cycle still finishes, publishes and is logged on the
    /// worker thread. Use [`Tracker::join`] to wait for it.
    pub fn stop(&mut self) -> TrackerResult<ScanStats> {
        let Session {
            mut scanner,
            worker,
            log,
        } = self.session.take().ok_or(TrackerError::NotRunning)?;

        scanner.stop();
        worker.shutdown();
        self.next_token = scanner.next_token();
        let stats = scanner.stats();

        self.retired.retain(|r| !r.worker.is_finished());
        self.retired.push(Retired { worker, log });

        info!(
            "Tracking stopped: {} scans, {} cycles, {} dropped, {} ignored",
            stats.started, stats.accepted, stats.dropped, stats.ignored
        );
        Ok(stats)
    }

    /// Wait for stopped sessions to finish their last cycle and flush logs
    pub fn join(&mut self) {
        for Retired { mut worker, log } in self.retired.drain(..) {
            worker.join();
            log.join();
        }
    }

    pub fn latest_position(&self) -> Option<PositionUpdate> {
        self.latest.get()
    }

    /// Log that the walker reached the surveyed point `(x, y)`
    pub fn mark_waypoint(&self, x: f64, y: f64) -> TrackerResult<()> {
        let session = self.session.as_ref().ok_or(TrackerError::NotRunning)?;
        let catalogue = lock(&self.control).readings.catalogue().clone();
        session.log.waypoint(catalogue, x, y, self.clock.now());
        Ok(())
    }

    /// Scan loop counters of the current session
    pub fn stats(&self) -> Option<ScanStats> {
        self.session.as_ref().map(|s| s.scanner.stats())
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.session
            .as_ref()
            .map_or(PipelineState::Idle, |s| s.worker.state())
    }

    /// Builds the cycle input from the live readings and hands it to the worker
    fn trigger(&self, worker: WorkerHandle, log: Arc<InstrumentationLog>) -> ScanTrigger {
        let control = self.control.clone();
        let location_source = self.location_source.clone();
        let fallback = self.config.location_fallback.clone();
        let clock = self.clock.clone();

        Box::new(move |results: &[ScanObservation]| {
            let queried = match lock(&control).location.current() {
                Some(_) => None,
                None => LocationState::query(location_source.as_ref(), &fallback),
            };

            let job = {
                let mut guard = lock(&control);
                let state = &mut *guard;

                state.readings.reset();
                let kept = state.readings.record_scan(results);
                debug!("Scan kept {kept} of {} access points", results.len());

                let location = state.location.cache(queried);
                CycleJob {
                    registry: state.registry.clone(),
                    fingerprint: Fingerprint::capture(&state.snapshot, &state.readings, location, clock.now()),
                }
            };

            log.values(job.fingerprint.clone());
            worker.submit(job)
        })
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.stop();
        }
    }
}

fn load_registry(config: &TrackerConfig, catalogue: &AccessPointCatalogue) -> Arc<ModelRegistry> {
    let schema = FeatureSchema::for_catalogue(catalogue);
    let (registry, _report) = ModelRegistry::load_all(
        &config.models_dir,
        catalogue.building(),
        config.partition_scheme,
        &schema,
    );
    Arc::new(registry)
}
