//! Bounded question/answer history persisted as a JSON array.
//!
//! Every append reads the whole file, adds the entry, keeps the newest
//! `max_entries` and atomically rewrites the file. A mutex serializes the
//! read-modify-write so concurrent appends are never lost. A missing or
//! unreadable file reads as an empty history.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;

use crate::atomic::write_atomic;
use crate::models::LogEntry;

pub struct HistoryLog {
    path: PathBuf,
    max_entries: usize,
    lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry`, evicting the oldest entries beyond the cap.
    pub fn append(&self, entry: LogEntry) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = read_entries(&self.path);
        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }

        let bytes = serde_json::to_vec_pretty(&entries)?;
        write_atomic(&self.path, &bytes)
    }

    /// All retained entries, oldest first.
    pub fn all(&self) -> Vec<LogEntry> {
        read_entries(&self.path)
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<LogEntry> {
        read_entries(&self.path).pop()
    }
}

fn read_entries(path: &Path) -> Vec<LogEntry> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_slice(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable history log, treating as empty");
            Vec::new()
        }
    }
}
