//! Continuous position tracking for Wayfinder
//!
//! ## Overview
//!
//! Runs the scan-driven loop around the inference pipeline:
//!
//! ```text
//! start ─→ scan ─→ completion ─→ fingerprint ─→ worker ─→ sinks
//!            ↑          │
//!            └──────────┘ next scan requested immediately
//! ```
//!
//! - [`scan`] tags every scan it starts and ignores completions it did not ask for
//! - [`worker`] runs one cycle at a time and drops triggers while busy
//! - [`sink`] and [`instrumentation`] receive each published estimate
//! - [`tracker`] owns the live readings and ties the pieces together
//!
//! ## Threads
//!
//! | Thread               | Runs                                          |
//! |----------------------|-----------------------------------------------|
//! | caller (control)     | sensor/location/scan callbacks, fingerprints  |
//! | `wayfinder-inference`| model calls, publishing                       |
//! | `wayfinder-log`      | instrumentation formatting and file writes    |
//!
//! No callback blocks on model evaluation or disk I/O, and neither does
//! `Tracker::stop`. `Tracker::join` is the one call that waits for both.

#![deny(unsafe_code)]

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

pub mod errors;
pub mod instrumentation;
pub mod scan;
pub mod sink;
pub mod tracker;
pub mod worker;

pub use errors::{TrackerError, TrackerResult};
pub use instrumentation::InstrumentationLog;
pub use scan::{ScanCompletion, ScanDisposition, ScanOrchestrator, ScanPort, ScanStats, ScanToken, ScanTrigger};
pub use sink::{ChannelSink, FanOut, LatestPosition};
pub use tracker::Tracker;
pub use worker::{CycleJob, InferenceWorker, WorkerHandle};

// Guarded values are plain snapshots; a panic elsewhere leaves them usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}
