//! Daily logbook: one append-only text file per calendar day.
//!
//! Each line is `[<timestamp>] [<component>] <EVENT>: <details>`.
//! Purely diagnostic; nothing in dropwatch reads it back.

use std::{fmt, fs, path::PathBuf};

// Trait must be in scope for `.write_all()` on File.
use std::io::Write;

use jiff::Zoned;
use tracing::warn;

use crate::error::{Error, Result};

/// What a logbook line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// An action record was written (or would have been, in a dry run).
    ActionCreated,

    /// Observing or handling failed.
    Error,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ActionCreated => "ACTION_CREATED",
            Self::Error => "ERROR",
        })
    }
}

/// Appends entries to `<dir>/<YYYY-MM-DD>.log` on behalf of one component.
#[derive(Debug, Clone)]
pub struct Logbook {
    dir: PathBuf,
    component: String,
}

impl Logbook {
    pub fn new(dir: impl Into<PathBuf>, component: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            component: component.into(),
        }
    }

    /// Appends one entry to today's log.
    ///
    /// Line breaks in `details` are folded so every entry stays on one line.
    pub fn append(&self, event: LogEvent, details: &str) -> Result<()> {
        let now = Zoned::now();
        let path = self.dir.join(format!("{}.log", now.strftime("%Y-%m-%d")));
        let details = details.replace(['\r', '\n'], " ");
        let line = format!(
            "[{}] [{}] {event}: {details}\n",
            now.datetime(),
            self.component
        );

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::Logbook {
                path: path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .map_err(|source| Error::Logbook { path, source })
    }

    /// Like [`append`](Self::append), but a failure only warns.
    ///
    /// The logbook is diagnostic; losing a line must never stop the watcher.
    pub fn record(&self, event: LogEvent, details: &str) {
        if let Err(e) = self.append(event, details) {
            warn!(error = %e, "could not write logbook entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use tempfile::TempDir;

    fn read_only_log(dir: &Path) -> String {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1, "expected exactly one daily log");
        fs::read_to_string(files.remove(0)).unwrap()
    }

    #[test]
    fn append_writes_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let logbook = Logbook::new(dir.path(), "FilesystemWatcher");

        logbook
            .append(LogEvent::ActionCreated, "FILE_20250101_120000_a.md")
            .unwrap();
        logbook.append(LogEvent::Error, "disk full").unwrap();

        let log = read_only_log(dir.path());
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(
            lines[0].ends_with("] [FilesystemWatcher] ACTION_CREATED: FILE_20250101_120000_a.md")
        );
        assert!(lines[1].ends_with("] [FilesystemWatcher] ERROR: disk full"));
    }

    #[test]
    fn log_file_is_named_for_today() {
        let dir = TempDir::new().unwrap();
        let logbook = Logbook::new(dir.path(), "FilesystemWatcher");
        let today = Zoned::now().strftime("%Y-%m-%d").to_string();

        logbook.append(LogEvent::Error, "x").unwrap();

        assert!(dir.path().join(format!("{today}.log")).is_file());
    }

    #[test]
    fn multiline_details_stay_on_one_line() {
        let dir = TempDir::new().unwrap();
        let logbook = Logbook::new(dir.path(), "FilesystemWatcher");

        logbook.append(LogEvent::Error, "first\nsecond").unwrap();

        let log = read_only_log(dir.path());
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("ERROR: first second"));
    }

    #[test]
    fn append_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let logbook = Logbook::new(dir.path().join("missing"), "FilesystemWatcher");

        let err = logbook.append(LogEvent::Error, "x").unwrap_err();
        assert!(matches!(err, Error::Logbook { .. }));

        // The lenient variant swallows it.
        logbook.record(LogEvent::Error, "x");
    }
}
