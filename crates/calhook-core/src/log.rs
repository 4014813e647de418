//! Append-only history of observed event batches.
//!
//! The [`EventLog`] is an event history, not a current-state table: the same
//! calendar resource may appear in many batches. Batches are never merged,
//! overwritten or deduplicated.
//!
//! A log is either purely in memory or backed by a JSON-lines file, one
//! batch per line. Opening a file-backed log replays the lines already on
//! disk.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::EventBatch;

/// Errors raised by a file-backed event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// Reading or writing the backing file failed.
    #[error("event log IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A batch could not be encoded as JSON.
    #[error("failed to encode event batch: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EventLogError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for event log operations.
pub type EventLogResult<T> = Result<T, EventLogError>;

/// Append-only, insertion-ordered sequence of [`EventBatch`].
#[derive(Debug, Default)]
pub struct EventLog {
    batches: RwLock<Vec<EventBatch>>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Creates an empty log that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a log backed by a JSON-lines file, replaying existing batches.
    ///
    /// The file and its parent directory are created when missing. Lines that
    /// fail to parse are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> EventLogResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| EventLogError::io(parent, e))?;
        }

        let batches = if path.exists() {
            Self::replay(&path)?
        } else {
            File::create(&path).map_err(|e| EventLogError::io(&path, e))?;
            Vec::new()
        };

        info!(path = %path.display(), batches = batches.len(), "Opened event log");
        Ok(Self {
            batches: RwLock::new(batches),
            path: Some(path),
        })
    }

    fn replay(path: &Path) -> EventLogResult<Vec<EventBatch>> {
        let file = File::open(path).map_err(|e| EventLogError::io(path, e))?;
        let mut batches = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| EventLogError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventBatch>(&line) {
                Ok(batch) => batches.push(batch),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping malformed event log line"),
            }
        }

        Ok(batches)
    }

    /// Returns the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends a batch. Never overwrites, merges or deduplicates.
    ///
    /// For a file-backed log the line is written before the batch becomes
    /// visible to readers; a failed write leaves the log unchanged.
    pub fn append(&self, batch: EventBatch) -> EventLogResult<()> {
        let mut batches = self.batches.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(ref path) = self.path {
            let mut line = serde_json::to_string(&batch)?;
            line.push('\n');
            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .map_err(|e| EventLogError::io(path, e))?;
            file.write_all(line.as_bytes())
                .map_err(|e| EventLogError::io(path, e))?;
        }

        debug!(events = batch.len(), "Appended event batch");
        batches.push(batch);
        Ok(())
    }

    /// Returns a snapshot of the full history in insertion order.
    pub fn read_all(&self) -> Vec<EventBatch> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Empties the history. Used for operational reset.
    pub fn clear(&self) -> EventLogResult<()> {
        let mut batches = self.batches.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(ref path) = self.path {
            File::create(path).map_err(|e| EventLogError::io(path, e))?;
        }

        let dropped = batches.len();
        batches.clear();
        info!(batches = dropped, "Cleared event log");
        Ok(())
    }

    /// Returns the number of batches.
    pub fn len(&self) -> usize {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no batch has been appended since the last clear.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EnrichedEvent;

    fn batch(ids: &[&str]) -> EventBatch {
        EventBatch::now(ids.iter().map(|id| EnrichedEvent::new(*id)).collect())
    }

    #[test]
    fn append_preserves_insertion_order() {
        let log = EventLog::in_memory();
        log.append(batch(&["a"])).unwrap();
        log.append(batch(&["b", "c"])).unwrap();

        let all = log.read_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].source_ids(), vec!["a"]);
        assert_eq!(all[1].source_ids(), vec!["b", "c"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let log = EventLog::in_memory();
        log.append(batch(&["a"])).unwrap();
        log.append(batch(&["a"])).unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn clear_after_two_appends_leaves_log_empty() {
        let log = EventLog::in_memory();
        log.append(batch(&["a"])).unwrap();
        log.append(batch(&["b"])).unwrap();

        log.clear().unwrap();
        assert!(log.read_all().is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn read_all_is_a_snapshot() {
        let log = EventLog::in_memory();
        log.append(batch(&["a"])).unwrap();
        let snapshot = log.read_all();
        log.append(batch(&["b"])).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn file_backed_log_replays_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        {
            let log = EventLog::open(&path).unwrap();
            log.append(batch(&["a"])).unwrap();
            log.append(batch(&["b"])).unwrap();
        }

        let reopened = EventLog::open(&path).unwrap();
        let all = reopened.read_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].source_ids(), vec!["b"]);
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[test]
    fn file_backed_clear_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let log = EventLog::open(&path).unwrap();
        log.append(batch(&["a"])).unwrap();
        log.clear().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(EventLog::open(&path).unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let good = serde_json::to_string(&batch(&["a"])).unwrap();
        fs::write(&path, format!("{}\nnot json\n\n{}\n", good, good)).unwrap();

        let log = EventLog::open(&path).unwrap();
        assert_eq!(log.len(), 2);
    }
}
