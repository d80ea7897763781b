//! Append-only instrumentation logs for offline evaluation
//!
//! Two files per building, appended across sessions:
//!
//! - `livetest_<building>.txt`: one record per published estimate, plus
//!   `DONE: (x,y) %<timestamp>` waypoints marking surveyed points
//! - `livetest_<building>_values.txt`: the raw fingerprint of every scan the
//!   tracker acted on, including scans dropped while inference was busy and
//!   scans that produced no estimate
//!
//! A new file starts with `%` header lines naming the building and the field
//! layout. Records look like:
//!
//! ```text
//! <13 sensor values>,<N ap levels>,<lat>,<lon>,<acc>,<x>,<y>,<partition> %<scanned>\t<published>
//! <13 sensor values>,<N ap levels>,<lat>,<lon>,<acc> %<scanned>
//! ```
//!
//! each followed by a blank line, with `?` for every missing value.
//!
//! Formatting and file I/O happen on a dedicated writer thread fed by an
//! unbounded channel, so neither publishing nor scanning waits on the disk.
//! A crash can lose records still in the channel.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};
use wayfinder_core::{format_timestamp, AccessPointCatalogue, FeatureSchema, Fingerprint, Task, Timestamp};
use wayfinder_ml::{PositionUpdate, ResultSink};

use crate::errors::TrackerResult;
use crate::lock;

const MISSING: &str = "?";

enum LogEntry {
    Record(PositionUpdate),
    Values(Fingerprint),
    Waypoint {
        catalogue: Arc<AccessPointCatalogue>,
        x: f64,
        y: f64,
        at: Timestamp,
    },
}

impl LogEntry {
    fn catalogue(&self) -> &AccessPointCatalogue {
        match self {
            LogEntry::Record(update) => update.fingerprint.readings.catalogue(),
            LogEntry::Values(fingerprint) => fingerprint.readings.catalogue(),
            LogEntry::Waypoint { catalogue, .. } => catalogue,
        }
    }

    fn kind(&self) -> LogKind {
        match self {
            LogEntry::Values(_) => LogKind::Values,
            LogEntry::Record(_) | LogEntry::Waypoint { .. } => LogKind::Positions,
        }
    }

    fn line(&self) -> String {
        match self {
            LogEntry::Record(update) => record(update),
            LogEntry::Values(fingerprint) => values(fingerprint),
            LogEntry::Waypoint { x, y, at, .. } => waypoint(*x, *y, *at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogKind {
    Positions,
    Values,
}

impl LogKind {
    fn path(self, dir: &Path, building: &str) -> PathBuf {
        match self {
            LogKind::Positions => InstrumentationLog::path_for(dir, building),
            LogKind::Values => InstrumentationLog::values_path_for(dir, building),
        }
    }

    fn header(self, catalogue: &AccessPointCatalogue) -> String {
        match self {
            LogKind::Positions => header(catalogue),
            LogKind::Values => values_header(catalogue),
        }
    }
}

pub struct InstrumentationLog {
    dir: PathBuf,
    tx: Mutex<Option<Sender<LogEntry>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl InstrumentationLog {
    /// Create the log directory and start the writer thread
    pub fn open(dir: impl Into<PathBuf>) -> TrackerResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::channel();
        let writer_dir = dir.clone();
        let writer = thread::Builder::new()
            .name("wayfinder-log".into())
            .spawn(move || writer_loop(writer_dir, rx))?;

        Ok(Self {
            dir,
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// File receiving a building's estimates and waypoints
    pub fn path_for(dir: &Path, building: &str) -> PathBuf {
        dir.join(format!("livetest_{building}.txt"))
    }

    /// File receiving a building's per-scan fingerprints
    pub fn values_path_for(dir: &Path, building: &str) -> PathBuf {
        dir.join(format!("livetest_{building}_values.txt"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record the fingerprint captured for a scan
    pub fn values(&self, fingerprint: Fingerprint) {
        self.send(LogEntry::Values(fingerprint));
    }

    /// Record that the walker reached a surveyed point
    pub fn waypoint(&self, catalogue: Arc<AccessPointCatalogue>, x: f64, y: f64, at: Timestamp) {
        self.send(LogEntry::Waypoint { catalogue, x, y, at });
    }

    /// Stop accepting records
    ///
    /// Returns immediately; the writer drains what is queued and exits.
    pub fn close(&self) {
        drop(lock(&self.tx).take());
    }

    /// Close and wait until every queued record is on disk
    pub fn join(&self) {
        self.close();
        if let Some(writer) = lock(&self.writer).take() {
            if writer.join().is_err() {
                error!("Instrumentation writer panicked");
            }
        }
    }

    fn send(&self, entry: LogEntry) {
        match lock(&self.tx).as_ref() {
            Some(tx) => {
                if tx.send(entry).is_err() {
                    warn!("Instrumentation writer has stopped; record lost");
                }
            }
            None => debug!("Instrumentation log closed; record discarded"),
        }
    }
}

impl ResultSink for InstrumentationLog {
    fn publish(&self, update: &PositionUpdate) {
        self.send(LogEntry::Record(update.clone()));
    }
}

impl Drop for InstrumentationLog {
    fn drop(&mut self) {
        self.close();
    }
}

struct LogFile {
    building: String,
    writer: BufWriter<File>,
}

struct LogWriter {
    dir: PathBuf,
    positions: Option<LogFile>,
    values: Option<LogFile>,
}

impl LogWriter {
    /// Writer for the entry's file, switching files when the building changes
    fn file_for(&mut self, kind: LogKind, catalogue: &AccessPointCatalogue) -> io::Result<&mut BufWriter<File>> {
        let slot = match kind {
            LogKind::Positions => &mut self.positions,
            LogKind::Values => &mut self.values,
        };

        let building = catalogue.building();
        if slot.as_ref().map(|f| f.building.as_str()) != Some(building) {
            if let Some(mut previous) = slot.take() {
                previous.writer.flush()?;
            }

            let path = kind.path(&self.dir, building);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let fresh = file.metadata()?.len() == 0;
            let mut writer = BufWriter::new(file);
            if fresh {
                writer.write_all(kind.header(catalogue).as_bytes())?;
            }
            debug!("Instrumentation log for {building}: {}", path.display());
            *slot = Some(LogFile {
                building: building.to_string(),
                writer,
            });
        }

        match slot {
            Some(file) => Ok(&mut file.writer),
            None => Err(io::Error::new(io::ErrorKind::Other, "no log file open")),
        }
    }

    fn write(&mut self, entry: &LogEntry) -> io::Result<()> {
        let line = entry.line();
        let file = self.file_for(entry.kind(), entry.catalogue())?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    fn finish(&mut self) {
        for file in [self.positions.take(), self.values.take()].into_iter().flatten() {
            let mut writer = file.writer;
            if let Err(e) = writer.flush() {
                error!("Instrumentation log flush failed: {e}");
            }
        }
    }
}

fn writer_loop(dir: PathBuf, rx: Receiver<LogEntry>) {
    let mut writer = LogWriter {
        dir,
        positions: None,
        values: None,
    };

    for entry in rx {
        if let Err(e) = writer.write(&entry) {
            error!("Instrumentation log write failed: {e}");
        }
    }

    writer.finish();
}

fn field_names(catalogue: &AccessPointCatalogue) -> String {
    FeatureSchema::for_catalogue(catalogue).names().join(",")
}

/// `%` header for a new estimates file
pub fn header(catalogue: &AccessPointCatalogue) -> String {
    let mut fields = field_names(catalogue);
    for task in Task::ALL {
        fields.push(',');
        fields.push_str(task.target_name());
    }

    format!(
        "% Wayfinder instrumentation log\n% building: {}\n% fields: {fields}\n% timestamps: scanned\tpublished\n\n",
        catalogue.building()
    )
}

/// `%` header for a new per-scan values file
pub fn values_header(catalogue: &AccessPointCatalogue) -> String {
    format!(
        "% Wayfinder scan values\n% building: {}\n% fields: {}\n% timestamps: scanned\n\n",
        catalogue.building(),
        field_names(catalogue)
    )
}

/// Sensor values, access point levels and location of a fingerprint
fn fingerprint_fields(fingerprint: &Fingerprint) -> String {
    let mut line = fingerprint
        .snapshot
        .scalars()
        .iter()
        .map(ToString::to_string)
        .chain(fingerprint.readings.levels().iter().map(ToString::to_string))
        .collect::<Vec<_>>()
        .join(",");

    match fingerprint.location {
        Some(fix) => {
            let _ = write!(line, ",{},{},{}", fix.latitude, fix.longitude, fix.accuracy);
        }
        None => line.push_str(",?,?,?"),
    }
    line
}

/// One record line for a published cycle
pub fn record(update: &PositionUpdate) -> String {
    let mut line = fingerprint_fields(&update.fingerprint);
    let _ = write!(
        line,
        ",{},{},{} %{}\t{}\n\n",
        optional(update.x),
        optional(update.y),
        update.partition,
        format_timestamp(update.scanned_at()),
        format_timestamp(update.published_at),
    );
    line
}

/// One values line for a scan
pub fn values(fingerprint: &Fingerprint) -> String {
    let mut line = fingerprint_fields(fingerprint);
    let _ = write!(line, " %{}\n\n", format_timestamp(fingerprint.captured_at));
    line
}

/// Checkpoint record for a surveyed point
pub fn waypoint(x: f64, y: f64, at: Timestamp) -> String {
    format!("DONE: ({x},{y}) %{}\n\n", format_timestamp(at))
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}
