use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub question: String,
    pub timestamp: String,
}

impl HistoryRecord {
    pub fn now(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait HistoryRepository: Send + Sync {
    fn load(&self) -> Vec<HistoryRecord>;

    fn append(&self, record: HistoryRecord) -> Result<Vec<HistoryRecord>, HistoryError>;
}

/// History kept as a single pretty-printed JSON array.
///
/// Every append rewrites the whole file through a sibling temp file and a rename.
/// Appends from this process are serialized; separate processes sharing one file can
/// still lose each other's updates.
pub struct JsonFileHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

enum Snapshot {
    Missing,
    Valid(Vec<HistoryRecord>),
    Corrupt(String),
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> Snapshot {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Snapshot::Missing,
            Err(e) => return Snapshot::Corrupt(e.to_string()),
        };
        match serde_json::from_str::<Vec<HistoryRecord>>(&raw) {
            Ok(records) => Snapshot::Valid(records),
            Err(e) => Snapshot::Corrupt(e.to_string()),
        }
    }

    fn io_error(&self, source: io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Moves an unparsable file aside so the next rewrite does not destroy it.
    fn quarantine(&self) -> Result<PathBuf, HistoryError> {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Local::now().format("%Y%m%d%H%M%S%3f")));
        let target = PathBuf::from(name);
        fs::rename(&self.path, &target).map_err(|e| self.io_error(e))?;
        Ok(target)
    }

    fn write_atomic(&self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(records)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut file = fs::File::create(&tmp).map_err(|e| self.io_error(e))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

impl HistoryRepository for JsonFileHistory {
    fn load(&self) -> Vec<HistoryRecord> {
        match self.read_snapshot() {
            Snapshot::Missing => Vec::new(),
            Snapshot::Valid(records) => records,
            Snapshot::Corrupt(reason) => {
                log::warn!(
                    "history file {} is unreadable ({reason}); treating as empty",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    fn append(&self, record: HistoryRecord) -> Result<Vec<HistoryRecord>, HistoryError> {
        let _guard = self.write_lock.lock();

        let mut records = match self.read_snapshot() {
            Snapshot::Missing => Vec::new(),
            Snapshot::Valid(records) => records,
            Snapshot::Corrupt(reason) => {
                let moved_to = self.quarantine()?;
                log::warn!(
                    "history file {} is unreadable ({reason}); moved to {} and starting fresh",
                    self.path.display(),
                    moved_to.display()
                );
                Vec::new()
            }
        };

        records.push(record);
        self.write_atomic(&records)?;
        Ok(records)
    }
}
