//! Result sinks for published positions

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, RwLock};

use wayfinder_ml::{PositionUpdate, ResultSink};

use crate::{lock, read};

/// Latest estimate, for display
#[derive(Debug, Clone, Default)]
pub struct LatestPosition {
    inner: Arc<RwLock<Option<PositionUpdate>>>,
}

impl LatestPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<PositionUpdate> {
        read(&self.inner).clone()
    }
}

impl ResultSink for LatestPosition {
    fn publish(&self, update: &PositionUpdate) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(update.clone());
    }
}

/// Forwards every estimate to a channel; a closed receiver is ignored
#[derive(Debug)]
pub struct ChannelSink {
    tx: Mutex<Sender<PositionUpdate>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<PositionUpdate>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl ResultSink for ChannelSink {
    fn publish(&self, update: &PositionUpdate) {
        let _ = lock(&self.tx).send(update.clone());
    }
}

/// Publishes to several sinks in order
#[derive(Default, Clone)]
pub struct FanOut {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultSink for FanOut {
    fn publish(&self, update: &PositionUpdate) {
        for sink in &self.sinks {
            sink.publish(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use wayfinder_core::{AccessPointCatalogue, Fingerprint, PartitionLabel, SensorSnapshot, WifiReadingTable};

    fn update(x: f64) -> PositionUpdate {
        let catalogue = Arc::new(AccessPointCatalogue::new("Lab", &["aa:aa:aa:aa:aa:01"]).unwrap());
        PositionUpdate {
            building: "Lab".into(),
            partition: PartitionLabel::new("middle"),
            x: Some(x),
            y: None,
            x_fresh: true,
            y_fresh: false,
            fingerprint: Arc::new(Fingerprint::capture(
                &SensorSnapshot::default(),
                &WifiReadingTable::new(catalogue),
                None,
                0,
            )),
            published_at: 0,
        }
    }

    #[test]
    fn latest_position_keeps_last_update() {
        let latest = LatestPosition::new();
        assert!(latest.get().is_none());

        latest.publish(&update(1.0));
        latest.publish(&update(2.0));
        assert_eq!(latest.get().unwrap().x, Some(2.0));
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let latest = LatestPosition::new();
        let (tx, rx) = mpsc::channel();
        let fan_out = FanOut::new()
            .with(Arc::new(latest.clone()))
            .with(Arc::new(ChannelSink::new(tx)));

        fan_out.publish(&update(3.0));

        assert_eq!(fan_out.len(), 2);
        assert_eq!(latest.get().unwrap().x, Some(3.0));
        assert_eq!(rx.try_recv().unwrap().x, Some(3.0));
    }

    #[test]
    fn closed_channel_is_harmless() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelSink::new(tx).publish(&update(1.0));
    }
}
