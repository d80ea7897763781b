//! Single-slot inference worker
//!
//! One dedicated thread runs inference cycles, one at a time. A submission
//! while a cycle is in flight is dropped rather than queued: a stale
//! fingerprint is worth less than waiting for the next scan.
//!
//! ```text
//! control thread                      inference thread
//!   submit() ── busy? ─yes─→ dropped
//!      │no
//!      └─ sync_channel(1) ──────────→ run_cycle() ─→ sink
//!                                         │
//!                                    busy = false
//! ```
//!
//! Shutting down never waits for a model: the in-flight cycle finishes and
//! publishes on its own thread, which then exits. [`InferenceWorker::join`]
//! waits for that explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use wayfinder_core::Fingerprint;
use wayfinder_ml::{InferencePipeline, ModelRegistry, PipelineState, StateHandle};

use crate::errors::TrackerResult;

/// One cycle's inputs: the fingerprint and the models it must use
#[derive(Debug)]
pub struct CycleJob {
    pub registry: Arc<ModelRegistry>,
    pub fingerprint: Fingerprint,
}

/// Cloneable submission side of the worker
#[derive(Clone)]
pub struct WorkerHandle {
    tx: SyncSender<Option<CycleJob>>,
    busy: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Start a cycle unless one is already running; returns whether it started
    pub fn submit(&self, job: CycleJob) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Inference busy; dropping scan at {}", job.fingerprint.captured_at);
            return false;
        }

        match self.tx.try_send(Some(job)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.busy.store(false, Ordering::Release);
                false
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

pub struct InferenceWorker {
    handle: WorkerHandle,
    state: StateHandle,
    thread: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    pub fn spawn(pipeline: InferencePipeline) -> TrackerResult<Self> {
        let (tx, rx) = mpsc::sync_channel(1);
        let busy = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let state = pipeline.state_handle();

        let thread = thread::Builder::new()
            .name("wayfinder-inference".into())
            .spawn({
                let busy = busy.clone();
                let closed = closed.clone();
                move || inference_loop(pipeline, rx, busy, closed)
            })?;

        Ok(Self {
            handle: WorkerHandle {
                tx,
                busy,
                closed,
            },
            state,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    pub fn submit(&self, job: CycleJob) -> bool {
        self.handle.submit(job)
    }

    pub fn is_busy(&self) -> bool {
        self.handle.is_busy()
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Refuse new work; the in-flight cycle, if any, still finishes
    ///
    /// Returns immediately. The thread exits once it is idle.
    pub fn shutdown(&self) {
        if self.handle.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // A full slot means a job is pending; the loop checks `closed` after it
        let _ = self.handle.tx.try_send(None);
    }

    /// Whether the inference thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Shut down and wait for the in-flight cycle and the thread to end
    pub fn join(&mut self) {
        self.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Inference thread panicked");
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn inference_loop(
    mut pipeline: InferencePipeline,
    rx: Receiver<Option<CycleJob>>,
    busy: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
) {
    info!("Inference worker started");

    while let Ok(Some(job)) = rx.recv() {
        if !Arc::ptr_eq(pipeline.registry(), &job.registry) {
            pipeline.set_registry(job.registry);
        }
        pipeline.run_cycle(&job.fingerprint);
        busy.store(false, Ordering::Release);

        if closed.load(Ordering::Acquire) {
            break;
        }
    }

    info!("Inference worker stopped");
}
