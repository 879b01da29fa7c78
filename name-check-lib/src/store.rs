//! Durable progress between runs.
//!
//! The store maps each name to its latest [`NameRecord`] and mirrors the map
//! to a JSON snapshot on disk. The mutex only ever guards map access; reading
//! and writing the snapshot happens with the lock released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::NameCheckError;
use crate::types::NameRecord;

/// Schema version written to every snapshot.
pub const SNAPSHOT_VERSION: &str = "2";

/// On-disk layout of the progress file.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    name_status: BTreeMap<String, NameRecord>,
    last_updated: DateTime<Utc>,
    version: String,
}

/// Thread-safe `name -> NameRecord` map backed by a JSON file.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    records: Mutex<HashMap<String, NameRecord>>,
}

impl ProgressStore {
    /// Create an empty store for `path`. Nothing is read until [`load`](Self::load).
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Create a store and load whatever snapshot exists at `path`.
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        let store = Self::new(path);
        store.load();
        store
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge the snapshot on disk into memory and return how many records were kept.
    ///
    /// Never fails: a missing file means a fresh start, and a file that cannot
    /// be read or parsed is logged and ignored (and left untouched until the
    /// next snapshot overwrites it). Records whose fields contradict their
    /// status are dropped, so those names get checked again.
    pub fn load(&self) -> usize {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no progress file, starting fresh");
                return 0;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read progress file");
                return 0;
            }
        };

        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed progress file");
                return 0;
            }
        };

        let mut loaded = 0;
        let mut records = self.lock();
        for (name, mut record) in snapshot.name_status {
            if !record.is_consistent() {
                warn!(
                    path = %self.path.display(),
                    name = %name,
                    status = ?record.status,
                    "dropping inconsistent progress record"
                );
                continue;
            }
            record.name = name.clone();
            records.insert(name, record);
            loaded += 1;
        }
        drop(records);

        info!(path = %self.path.display(), loaded, "loaded progress");
        loaded
    }

    /// Latest record for `name`, if any.
    pub fn get(&self, name: &str) -> Option<NameRecord> {
        self.lock().get(name).cloned()
    }

    /// Insert or replace the record for `record.name`.
    pub fn upsert(&self, record: NameRecord) {
        self.lock().insert(record.name.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every record, sorted by name.
    pub fn records(&self) -> Vec<NameRecord> {
        let mut records: Vec<NameRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Write the current map to disk.
    ///
    /// The map is copied under the lock; serialization and the write happen
    /// after it is released so concurrent upserts are never blocked on I/O.
    /// The file is replaced atomically via a uniquely named sibling temp
    /// file, so overlapping calls never trip over each other.
    pub fn snapshot(&self) -> crate::Result<()> {
        let name_status: BTreeMap<String, NameRecord> = self
            .lock()
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect();
        let count = name_status.len();

        let snapshot = Snapshot {
            name_status,
            last_updated: Utc::now(),
            version: SNAPSHOT_VERSION.to_string(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.io_error("create directory", e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error("create", e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| self.io_error("write", e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.io_error("replace", e.error))?;

        debug!(path = %self.path.display(), records = count, "progress saved");
        Ok(())
    }

    /// Forget every record and delete the snapshot file.
    pub fn clear(&self) -> crate::Result<()> {
        self.lock().clear();

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error("delete", e)),
        }

        info!(path = %self.path.display(), "progress cleared");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, NameRecord>> {
        // A panic while holding the guard cannot leave the map half-updated.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn io_error(&self, action: &str, err: std::io::Error) -> NameCheckError {
        NameCheckError::persistence(
            self.path.to_string_lossy(),
            format!("failed to {} progress file: {}", action, err),
        )
    }
}
