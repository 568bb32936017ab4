//! Command history for ysh
//!
//! An append-only, chronologically ordered log of submitted lines, backed by
//! a plain text file with one command per line. Lookups used by the line
//! editor (prefix recall and completion) never modify the store.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to read history file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write history file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Command history storage
#[derive(Debug, Default)]
pub struct HistoryStore {
    /// All entries (newest last)
    entries: Vec<String>,
    /// Backing file; `None` once persistence is off
    file_path: Option<PathBuf>,
}

impl HistoryStore {
    /// History that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load history from `path`, creating an empty log if none exists
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| HistoryError::Write {
                    path: path.clone(),
                    source,
                })?;
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| HistoryError::Write {
                    path: path.clone(),
                    source,
                })?;
        }

        let raw = fs::read(&path).map_err(|source| HistoryError::Read {
            path: path.clone(),
            source,
        })?;
        let entries: Vec<String> = String::from_utf8_lossy(&raw)
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();

        debug!(
            "Loaded {} history entries from {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            entries,
            file_path: Some(path),
        })
    }

    /// Record a submitted line and append it to the backing file.
    ///
    /// The entry is kept in memory even when writing fails; after a failure
    /// the store stops touching the file for the rest of the session.
    pub fn append(&mut self, line: &str) -> Result<()> {
        self.entries.push(line.to_string());

        let Some(path) = self.file_path.as_deref() else {
            return Ok(());
        };
        if let Err(source) = persist_line(path, line) {
            let path = self.file_path.take().unwrap_or_default();
            warn!(
                "History persistence disabled: {}: {}",
                path.display(),
                source
            );
            return Err(HistoryError::Write { path, source });
        }
        Ok(())
    }

    /// Whether appends still reach the backing file
    pub fn is_persistent(&self) -> bool {
        self.file_path.is_some()
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries starting with `prefix`, newest first.
    ///
    /// The iterator is lazy and `Clone`, so a search can be restarted from
    /// any point without touching the store.
    pub fn prefix_matches<'a>(&'a self, prefix: &'a str) -> PrefixMatches<'a> {
        PrefixMatches {
            inner: self.entries.iter().rev(),
            prefix,
        }
    }

    /// Index of the nearest entry older than `before` that starts with
    /// `prefix`; `None` for `before` searches from the newest entry.
    pub fn prev_match(&self, prefix: &str, before: Option<usize>) -> Option<usize> {
        let len = self.entries.len();
        let end = before.map_or(len, |before| before.min(len));
        self.entries[..end]
            .iter()
            .rposition(|entry| entry.starts_with(prefix))
    }

    /// Index of the nearest entry newer than `after` that starts with `prefix`
    pub fn next_match(&self, prefix: &str, after: usize) -> Option<usize> {
        let start = after.saturating_add(1);
        self.entries
            .get(start..)?
            .iter()
            .position(|entry| entry.starts_with(prefix))
            .map(|offset| start + offset)
    }
}

fn persist_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_data()
}

/// Lazy newest-first prefix search over history entries
#[derive(Clone)]
pub struct PrefixMatches<'a> {
    inner: std::iter::Rev<std::slice::Iter<'a, String>>,
    prefix: &'a str,
}

impl<'a> Iterator for PrefixMatches<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let prefix = self.prefix;
        self.inner
            .find(|entry| entry.starts_with(prefix))
            .map(String::as_str)
    }
}
