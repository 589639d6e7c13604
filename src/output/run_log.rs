//! Durable run log
//!
//! Two stores per job kind under one directory: `<kind>_runs.json` holds a
//! record array that is read, appended and rewritten whole, and
//! `<kind>_runs.csv` is a true append with the header written once.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::domain::model::*;
use crate::ports::RunLogPort;

/// Run logger writing structured and tabular stores
pub struct RunLogger {
    dir: PathBuf,
    write_lock: Mutex<()>,
    failures: AtomicUsize,
}

impl RunLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn json_path(&self, kind: JobKind) -> PathBuf {
        self.dir.join(format!("{}_runs.json", kind))
    }

    pub fn csv_path(&self, kind: JobKind) -> PathBuf {
        self.dir.join(format!("{}_runs.csv", kind))
    }

    /// Number of swallowed write failures since creation
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Records of the structured store, oldest first; corruption reads as empty
    pub fn history(&self, kind: JobKind) -> Vec<Value> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        read_records(&self.json_path(kind))
    }

    fn append(&self, entry: &RunLogEntry) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(e) = fs::create_dir_all(&self.dir) {
            self.record_failure("create log directory", &self.dir, &e);
            return;
        }

        let json_path = self.json_path(entry.kind);
        if let Err(e) = append_json(&json_path, entry) {
            self.record_failure("write run log", &json_path, &e);
        }

        let csv_path = self.csv_path(entry.kind);
        if let Err(e) = append_csv(&csv_path, entry) {
            self.record_failure("write run log", &csv_path, &e);
        }
    }

    fn record_failure(&self, action: &str, path: &Path, e: &io::Error) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!("Could not {} {}: {}", action, path.display(), e);
    }
}

impl RunLogPort for RunLogger {
    fn log(&self, entry: &RunLogEntry) {
        debug!("Logging {} run of {}", entry.kind, entry.file);
        self.append(entry);
    }
}

fn read_records(path: &Path) -> Vec<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Could not read {}, starting fresh: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Value>>(&content) {
        Ok(records) => records,
        Err(e) => {
            warn!("Run log {} is corrupt, starting fresh: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn append_json(path: &Path, entry: &RunLogEntry) -> io::Result<()> {
    let mut records = read_records(path);
    records.push(serde_json::to_value(entry)?);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, &records)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn append_csv(path: &Path, entry: &RunLogEntry) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let columns = entry.columns();

    if file.metadata()?.len() == 0 {
        let header: Vec<String> = columns.iter().map(|(name, _)| csv_field(name)).collect();
        writeln!(file, "{}", header.join(","))?;
    }

    let row: Vec<String> = columns.iter().map(|(_, value)| csv_field(value)).collect();
    writeln!(file, "{}", row.join(","))?;
    Ok(())
}

/// Quote a field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
