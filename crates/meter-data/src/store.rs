//! Durable append-only record logs.
//!
//! A [`RecordStore`] only ever grows: records are appended and listed back
//! in insertion order, never updated or removed. [`CsvLog`] keeps one record
//! per line in a flat CSV file; [`MemoryLog`] is the in-process equivalent.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::thread;
use std::time::Duration;

use meter_core::models::{Appliance, Reading};
use meter_core::{MeterError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// File name of the readings log inside the data directory.
pub const READINGS_FILE: &str = "electricity_readings.csv";

/// File name of the appliances log inside the data directory.
pub const APPLIANCES_FILE: &str = "appliances.csv";

/// Maximum number of attempts to open a log for appending.
const MAX_OPEN_ATTEMPTS: u32 = 3;

// ── Record types ──────────────────────────────────────────────────────────────

/// A record that can live in a log.
pub trait LogRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// CSV column names, in field order.
    const HEADERS: &'static [&'static str];

    /// Check the record's invariants before it is written or after it is read.
    fn validate(&self) -> Result<()>;
}

impl LogRecord for Reading {
    const HEADERS: &'static [&'static str] = &["timestamp", "reading", "image_path"];

    fn validate(&self) -> Result<()> {
        Reading::validate(self)
    }
}

impl LogRecord for Appliance {
    const HEADERS: &'static [&'static str] = &["name", "power_kw", "hours_per_day"];

    fn validate(&self) -> Result<()> {
        Appliance::validate(self)
    }
}

// ── RecordStore ───────────────────────────────────────────────────────────────

/// An append-only durable collection of records.
pub trait RecordStore<R>: Send + Sync {
    /// Validate and persist `record`. Once this returns `Ok`, the record is
    /// visible to every later [`list_all`](RecordStore::list_all).
    fn append(&self, record: &R) -> Result<()>;

    /// All records in insertion order.
    fn list_all(&self) -> Result<Vec<R>>;
}

/// Store of meter readings.
pub type ReadingStore = dyn RecordStore<Reading>;

/// Store of appliance profiles.
pub type ApplianceStore = dyn RecordStore<Appliance>;

// ── CsvLog ────────────────────────────────────────────────────────────────────

/// A CSV file with a header row and one record per line.
///
/// Appends are serialized through a writer lock and each record reaches the
/// file in a single write followed by `sync_data`. Reads take no lock.
///
/// A record counts as committed once its terminating newline is on disk.
/// Bytes after the last newline (a write torn by a crash or a full disk)
/// are skipped when listing and cut off before the next append.
pub struct CsvLog<R> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: LogRecord> CsvLog<R> {
    /// Open the log at `path`, creating the file (and its parent directory)
    /// with a header row when it holds no complete line yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let log = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        };
        log.ensure_header()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_header(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let committed = match std::fs::read(&self.path) {
            Ok(bytes) => committed_len(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(self.storage_error(e)),
        };
        if committed > 0 {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
            }
        }

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record(R::HEADERS)
            .map_err(|e| MeterError::Other(e.into()))?;
        let header = writer.into_inner().map_err(|e| MeterError::Io(e.into_error()))?;

        self.write_line(&header)?;
        debug!("Initialised record log {}", self.path.display());
        Ok(())
    }

    /// Encode one record as a complete CSV line.
    fn encode(record: &R) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .serialize(record)
            .map_err(|e| MeterError::Other(e.into()))?;
        writer.into_inner().map_err(|e| MeterError::Io(e.into_error()))
    }

    /// Open for appending, retrying transient failures with linear back-off
    /// (0 ms, 100 ms, 200 ms). Nothing has been written yet at this point.
    fn open_for_append(&self) -> Result<File> {
        let mut last_err = None;

        for attempt in 0..MAX_OPEN_ATTEMPTS {
            if attempt > 0 {
                let sleep_ms = u64::from(attempt) * 100;
                debug!(attempt, sleep_ms, "retrying log open after back-off");
                thread::sleep(Duration::from_millis(sleep_ms));
            }

            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(file) => return Ok(file),
                Err(e) => {
                    warn!(
                        "Failed to open {} for append (attempt {}): {}",
                        self.path.display(),
                        attempt + 1,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }

        let err = last_err
            .unwrap_or_else(|| std::io::Error::other("log could not be opened for append"));
        Err(self.storage_error(err))
    }

    /// Append `line`, truncating back to the previous end of file if the
    /// write or the sync fails.
    fn write_line(&self, line: &[u8]) -> Result<()> {
        let file = self.open_for_append()?;
        let committed = self.discard_torn_tail(&file)?;

        if let Err(e) = write_synced(&file, line) {
            if let Err(rollback) = file.set_len(committed) {
                warn!(
                    "Could not roll back partial write to {}: {}",
                    self.path.display(),
                    rollback
                );
            }
            return Err(self.storage_error(e));
        }
        Ok(())
    }

    /// Cut off an unterminated trailing record and return the committed
    /// length of the file.
    fn discard_torn_tail(&self, file: &File) -> Result<u64> {
        let len = file.metadata().map_err(|e| self.storage_error(e))?.len();
        if len == 0 || self.ends_with_newline(len)? {
            return Ok(len);
        }

        let bytes = std::fs::read(&self.path).map_err(|e| self.storage_error(e))?;
        let committed = committed_len(&bytes) as u64;
        warn!(
            "Discarding {} byte(s) of an unterminated record at the end of {}",
            len - committed,
            self.path.display()
        );
        file.set_len(committed).map_err(|e| self.storage_error(e))?;
        Ok(committed)
    }

    fn ends_with_newline(&self, len: u64) -> Result<bool> {
        let mut last = [0u8; 1];
        let mut reader = File::open(&self.path).map_err(|e| self.storage_error(e))?;
        reader
            .seek(SeekFrom::Start(len - 1))
            .and_then(|_| reader.read_exact(&mut last))
            .map_err(|e| self.storage_error(e))?;
        Ok(last[0] == b'\n')
    }

    fn storage_error(&self, source: std::io::Error) -> MeterError {
        MeterError::Storage {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, line: u64, reason: impl Into<String>) -> MeterError {
        MeterError::CorruptLog {
            path: self.path.clone(),
            line,
            reason: reason.into(),
        }
    }
}

impl<R: LogRecord> RecordStore<R> for CsvLog<R> {
    fn append(&self, record: &R) -> Result<()> {
        record.validate()?;
        let line = Self::encode(record)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.write_line(&line)?;

        debug!("Appended record to {}", self.path.display());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<R>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Record log {} is missing", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.storage_error(e)),
        };

        let committed = committed_len(&bytes);
        if committed < bytes.len() {
            warn!(
                "Ignoring unterminated record at the end of {}",
                self.path.display()
            );
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(&bytes[..committed]);
        let headers = reader
            .headers()
            .map_err(|e| self.corrupt(1, e.to_string()))?
            .clone();

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result.map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                self.corrupt(line, e.to_string())
            })?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            let record: R = row
                .deserialize(Some(&headers))
                .map_err(|e| self.corrupt(line, e.to_string()))?;
            record
                .validate()
                .map_err(|e| self.corrupt(line, e.to_string()))?;
            records.push(record);
        }

        debug!(
            "Loaded {} records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

/// Length of the prefix of `bytes` that ends with the last newline.
fn committed_len(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1)
}

fn write_synced(mut file: &File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line)?;
    file.sync_data()
}

// ── MemoryLog ─────────────────────────────────────────────────────────────────

/// In-memory log with the same contract as [`CsvLog`], minus durability.
pub struct MemoryLog<R> {
    records: RwLock<Vec<R>>,
}

impl<R> Default for MemoryLog<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl<R: LogRecord> MemoryLog<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: LogRecord> RecordStore<R> for MemoryLog<R> {
    fn append(&self, record: &R) -> Result<()> {
        record.validate()?;
        self.records
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<R>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
