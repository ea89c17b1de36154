//! Interval archive writer.
//!
//! One flush produces one JSONL file containing a document per tracked
//! counter. Files are laid out by the interval's end date and the node's
//! hostname:
//!
//! `<data_dir>/switch/YYYY/MM/DD/<hostname>/<start>-to-<end>-switch.jsonl`

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use swtel_schema::IntervalBatch;

use crate::filesystem::{Filesystem, FsError};

/// Format a Unix timestamp the way archive file names carry it.
/// Format: YYYY-MM-DDTHH:MM:SS (UTC)
pub fn format_archive_time(ts_unix: u64) -> String {
    Utc.timestamp_opt(ts_unix as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| ts_unix.to_string())
}

/// Build the archive path for an interval.
pub fn archive_path(data_dir: &Path, start: u64, end: u64, hostname: &str) -> PathBuf {
    let date_dir = Utc
        .timestamp_opt(end as i64, 0)
        .single()
        .map(|dt| dt.format("%Y/%m/%d").to_string())
        .unwrap_or_else(|| "unknown-date".to_string());

    let file_name = format!(
        "{}-to-{}-switch.jsonl",
        format_archive_time(start),
        format_archive_time(end)
    );

    data_dir
        .join("switch")
        .join(date_dir)
        .join(hostname)
        .join(file_name)
}

/// Trait for persisting the documents drained by one flush.
pub trait ArchiveWriter: Send + Sync {
    /// Persist a batch as a single archival unit, returning where it went.
    fn write(&self, batch: &IntervalBatch) -> Result<PathBuf, FsError>;
}

/// Archive writer producing one JSONL file per batch.
#[derive(Debug, Clone)]
pub struct JsonlArchiveWriter<F: Filesystem> {
    fs: F,
    data_dir: PathBuf,
}

impl<F: Filesystem> JsonlArchiveWriter<F> {
    pub fn new(fs: F, data_dir: PathBuf) -> Self {
        Self { fs, data_dir }
    }

    /// Get the base data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl<F: Filesystem> ArchiveWriter for JsonlArchiveWriter<F> {
    fn write(&self, batch: &IntervalBatch) -> Result<PathBuf, FsError> {
        let path = archive_path(&self.data_dir, batch.start, batch.end, &batch.hostname);
        let parent = path
            .parent()
            .ok_or_else(|| FsError::Path(format!("no parent directory: {}", path.display())))?;
        self.fs.create_dir_all(parent)?;

        let body = batch.to_jsonl()?;
        self.fs.write_atomic(&path, body.as_bytes())?;

        Ok(path)
    }
}

/// Mock archive writer that records batches in memory.
/// Cloning creates a new handle to the same recorded data.
#[derive(Debug, Clone, Default)]
pub struct MockArchiveWriter {
    batches: Arc<Mutex<Vec<IntervalBatch>>>,
    failing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl MockArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Batches written successfully, in order.
    pub fn batches(&self) -> Vec<IntervalBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// Number of write calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ArchiveWriter for MockArchiveWriter {
    fn write(&self, batch: &IntervalBatch) -> Result<PathBuf, FsError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated archive failure",
            )));
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(archive_path(Path::new("/mock"), batch.start, batch.end, &batch.hostname))
    }
}
