//! WiFi scan orchestration
//!
//! Drives the continuous scan loop: start a scan, wait for its completion,
//! hand the results to the trigger, start the next scan. Scan results are a
//! broadcast on most platforms, so every scan this orchestrator starts is
//! tagged with a fresh [`ScanToken`] and only a completion carrying the
//! outstanding token is acted on. Anything else (another consumer's scan,
//! a stale completion after a restart) is ignored.
//!
//! A refused request leaves no token to wait for. The orchestrator then
//! accepts the next delivery of any origin, which re-arms the loop; scan
//! throttling on the platform therefore pauses tracking instead of ending it.

use std::sync::Arc;

use log::{debug, warn};
use wayfinder_core::ScanObservation;

/// Correlates a scan request with its completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanToken(pub u64);

/// Platform WiFi scanner
pub trait ScanPort: Send + Sync {
    /// Request a scan; `false` when the platform refuses
    fn start_scan(&self, token: ScanToken) -> bool;
}

/// Results delivered by the platform for one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCompletion {
    /// Token of the request, `None` for scans nobody here asked for
    pub token: Option<ScanToken>,
    pub results: Vec<ScanObservation>,
}

impl ScanCompletion {
    pub fn new(token: Option<ScanToken>, results: Vec<ScanObservation>) -> Self {
        Self { token, results }
    }
}

/// What happened to a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDisposition {
    /// Triggered an inference cycle
    Accepted,
    /// Ours, but the inference worker was busy
    Dropped,
    /// Not a scan this orchestrator is waiting for
    Ignored,
}

/// Scan loop counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub started: u64,
    pub refused: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub ignored: u64,
}

/// Called with each accepted scan's results; returns whether a cycle started
pub type ScanTrigger = Box<dyn FnMut(&[ScanObservation]) -> bool + Send>;

pub struct ScanOrchestrator {
    port: Arc<dyn ScanPort>,
    trigger: ScanTrigger,
    next_token: u64,
    outstanding: Option<ScanToken>,
    /// Last request was refused; any delivery resumes the loop
    awaiting_any: bool,
    active: bool,
    stats: ScanStats,
}

impl ScanOrchestrator {
    pub fn new(port: Arc<dyn ScanPort>, trigger: ScanTrigger) -> Self {
        Self {
            port,
            trigger,
            next_token: 0,
            outstanding: None,
            awaiting_any: false,
            active: false,
            stats: ScanStats::default(),
        }
    }

    /// Continue numbering after the tokens of an earlier session
    pub fn with_first_token(mut self, token: ScanToken) -> Self {
        self.next_token = token.0;
        self
    }

    /// Token the next request will carry
    pub fn next_token(&self) -> ScanToken {
        ScanToken(self.next_token)
    }

    /// Begin the scan loop
    pub fn start(&mut self) -> Option<ScanToken> {
        self.active = true;
        self.start_scan()
    }

    /// End the scan loop; later completions are ignored
    pub fn stop(&mut self) {
        self.active = false;
        self.outstanding = None;
        self.awaiting_any = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn outstanding(&self) -> Option<ScanToken> {
        self.outstanding
    }

    /// Whether the loop waits for any delivery after a refused request
    pub fn is_awaiting_any(&self) -> bool {
        self.awaiting_any
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Request a scan with a fresh token
    ///
    /// A refused request is not retried; the loop resumes on the next
    /// completion the platform delivers, whatever its token.
    pub fn start_scan(&mut self) -> Option<ScanToken> {
        if !self.active {
            debug!("Scan requested while stopped");
            return None;
        }

        let token = ScanToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);

        if self.port.start_scan(token) {
            self.stats.started += 1;
            self.outstanding = Some(token);
            self.awaiting_any = false;
            Some(token)
        } else {
            warn!("Platform refused WiFi scan {}", token.0);
            self.stats.refused += 1;
            self.outstanding = None;
            self.awaiting_any = true;
            None
        }
    }

    /// Handle a delivered scan: trigger inference and start the next scan
    pub fn on_scan_completed(&mut self, completion: ScanCompletion) -> ScanDisposition {
        let expected = completion.token.is_some() && completion.token == self.outstanding;
        let ours = self.active && (expected || self.awaiting_any);
        if !ours {
            debug!("Ignoring scan completion {:?}", completion.token);
            self.stats.ignored += 1;
            return ScanDisposition::Ignored;
        }

        if !expected {
            debug!("Resuming scan loop with delivery {:?}", completion.token);
        }
        self.outstanding = None;
        self.awaiting_any = false;
        let accepted = (self.trigger)(&completion.results);
        self.start_scan();

        if accepted {
            self.stats.accepted += 1;
            ScanDisposition::Accepted
        } else {
            self.stats.dropped += 1;
            ScanDisposition::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubPort {
        refuse: AtomicBool,
        requested: Mutex<Vec<ScanToken>>,
    }

    impl ScanPort for StubPort {
        fn start_scan(&self, token: ScanToken) -> bool {
            self.requested.lock().unwrap().push(token);
            !self.refuse.load(Ordering::SeqCst)
        }
    }

    fn orchestrator(accept: bool) -> (ScanOrchestrator, Arc<StubPort>, Arc<Mutex<Vec<usize>>>) {
        let port = Arc::new(StubPort::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let trigger: ScanTrigger = Box::new(move |results: &[ScanObservation]| {
            log.lock().unwrap().push(results.len());
            accept
        });
        (ScanOrchestrator::new(port.clone(), trigger), port, seen)
    }

    #[test]
    fn completion_triggers_and_rescans() {
        let (mut scanner, port, seen) = orchestrator(true);
        let first = scanner.start().unwrap();

        let results = vec![ScanObservation::new("aa:aa:aa:aa:aa:01", -50)];
        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(Some(first), results)), ScanDisposition::Accepted);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(port.requested.lock().unwrap().len(), 2);
        assert_eq!(scanner.outstanding(), Some(ScanToken(1)));
    }

    #[test]
    fn foreign_and_stale_completions_are_ignored() {
        let (mut scanner, _port, seen) = orchestrator(true);
        let first = scanner.start().unwrap();

        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(None, Vec::new())), ScanDisposition::Ignored);
        assert_eq!(
            scanner.on_scan_completed(ScanCompletion::new(Some(ScanToken(99)), Vec::new())),
            ScanDisposition::Ignored
        );

        scanner.on_scan_completed(ScanCompletion::new(Some(first), Vec::new()));
        // Same token delivered twice
        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(Some(first), Vec::new())), ScanDisposition::Ignored);

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(scanner.stats().ignored, 3);
    }

    #[test]
    fn busy_trigger_is_reported_as_dropped() {
        let (mut scanner, port, _seen) = orchestrator(false);
        let token = scanner.start().unwrap();

        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(Some(token), Vec::new())), ScanDisposition::Dropped);
        assert_eq!(port.requested.lock().unwrap().len(), 2);
        assert_eq!(scanner.stats().dropped, 1);
    }

    #[test]
    fn refused_scan_waits_for_next_delivery() {
        let (mut scanner, port, _seen) = orchestrator(true);
        port.refuse.store(true, Ordering::SeqCst);

        assert_eq!(scanner.start(), None);
        assert_eq!(port.requested.lock().unwrap().len(), 1);
        assert_eq!(scanner.stats().refused, 1);
        assert_eq!(scanner.outstanding(), None);
        assert!(scanner.is_awaiting_any());
    }

    #[test]
    fn delivery_after_refused_rescan_resumes_loop() {
        let (mut scanner, port, seen) = orchestrator(true);
        let first = scanner.start().unwrap();

        port.refuse.store(true, Ordering::SeqCst);
        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(Some(first), Vec::new())), ScanDisposition::Accepted);
        assert_eq!(scanner.outstanding(), None);

        // Throttling lifts; the platform's next broadcast carries no token of ours
        port.refuse.store(false, Ordering::SeqCst);
        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(None, Vec::new())), ScanDisposition::Accepted);
        assert!(!scanner.is_awaiting_any());
        let next = scanner.outstanding().unwrap();

        // Back to strict correlation
        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(None, Vec::new())), ScanDisposition::Ignored);
        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(Some(next), Vec::new())), ScanDisposition::Accepted);

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(port.requested.lock().unwrap().len(), 4);
        let stats = scanner.stats();
        assert_eq!((stats.started, stats.refused, stats.accepted, stats.ignored), (3, 1, 3, 1));
    }

    #[test]
    fn stopped_orchestrator_ignores_everything() {
        let (mut scanner, port, _seen) = orchestrator(true);
        let token = scanner.start().unwrap();
        scanner.stop();

        assert_eq!(scanner.on_scan_completed(ScanCompletion::new(Some(token), Vec::new())), ScanDisposition::Ignored);
        assert_eq!(scanner.start_scan(), None);
        assert_eq!(port.requested.lock().unwrap().len(), 1);
    }
}
