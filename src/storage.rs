//! The managed vault and its directories.
//!
//! ```text
//! <vault>/
//!   Inbox/            # Copies of dropped files
//!   Needs_Action/     # One markdown action record per drop
//!   Logs/             # Daily append-only logs (YYYY-MM-DD.log)
//!   STOP.md           # Emergency stop marker; presence halts processing
//! ```

mod logbook;

pub use logbook::{LogEvent, Logbook};

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

const INBOX: &str = "Inbox";
const NEEDS_ACTION: &str = "Needs_Action";
const LOGS: &str = "Logs";
const STOP_FILE: &str = "STOP.md";

/// Name of the throwaway file used to prove a directory is writable.
const WRITE_PROBE: &str = ".dropwatch-probe";

/// Layout of the managed vault. Holds paths only; no open handles.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox(&self) -> PathBuf {
        self.root.join(INBOX)
    }

    pub fn needs_action(&self) -> PathBuf {
        self.root.join(NEEDS_ACTION)
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join(LOGS)
    }

    pub fn stop_file(&self) -> PathBuf {
        self.root.join(STOP_FILE)
    }

    /// Whether the emergency stop marker is present. Content is ignored.
    pub fn is_halted(&self) -> bool {
        self.stop_file().exists()
    }

    /// Creates the vault directories.
    ///
    /// With `probe` set, also proves each one is writable, so an unusable
    /// vault fails at startup instead of on the first drop.
    pub fn prepare(&self, probe: bool) -> Result<()> {
        for dir in [self.inbox(), self.needs_action(), self.logs()] {
            ensure_dir(&dir, probe)?;
        }
        Ok(())
    }
}

/// Creates `dir` (and parents) if missing, optionally probing writability.
pub(crate) fn ensure_dir(dir: &Path, probe: bool) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    if probe {
        probe_writable(dir).map_err(|source| Error::NotWritable {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn probe_writable(dir: &Path) -> io::Result<()> {
    let probe = dir.join(WRITE_PROBE);
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)?;
    fs::remove_file(probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn prepare_creates_layout() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::new(dir.path().join("vault"));

        vault.prepare(true).unwrap();

        assert!(vault.inbox().is_dir());
        assert!(vault.needs_action().is_dir());
        assert!(vault.logs().is_dir());
        // The probe cleans up after itself.
        assert!(!vault.inbox().join(WRITE_PROBE).exists());
    }

    #[test]
    fn prepare_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::new(dir.path());

        vault.prepare(true).unwrap();
        fs::write(vault.inbox().join("keep.txt"), "x").unwrap();
        vault.prepare(true).unwrap();

        assert!(vault.inbox().join("keep.txt").exists());
    }

    #[test]
    fn prepare_fails_when_a_directory_is_a_file() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::new(dir.path());
        fs::write(vault.inbox(), "not a directory").unwrap();

        let err = vault.prepare(false).unwrap_err();

        assert!(matches!(err, Error::CreateDir { .. }));
    }

    #[test]
    fn stop_marker_presence_halts() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::new(dir.path());
        assert!(!vault.is_halted());

        // Empty is enough; content is never read.
        fs::write(vault.stop_file(), "").unwrap();
        assert!(vault.is_halted());

        fs::remove_file(vault.stop_file()).unwrap();
        assert!(!vault.is_halted());
    }
}
