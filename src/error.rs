//! Error type shared by the watcher, the arrival handler, and startup.

use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not determine home directory; pass --vault and --drop explicitly")]
    NoHomeDir,

    #[error("poll interval must be at least one second")]
    InvalidInterval,

    #[error("cannot resolve path {}: {source}", path.display())]
    InvalidPath { path: PathBuf, source: io::Error },

    #[error("failed to create {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("{} is not writable: {source}", path.display())]
    NotWritable { path: PathBuf, source: io::Error },

    #[error("failed to scan {}: {source}", path.display())]
    Scan { path: PathBuf, source: io::Error },

    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to write action record {}: {source}", path.display())]
    WriteRecord { path: PathBuf, source: io::Error },

    #[error("failed to render action record: {0}")]
    Render(#[from] serde_json::Error),

    #[error("failed to append to log {}: {source}", path.display())]
    Logbook { path: PathBuf, source: io::Error },

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to start {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: io::Error,
    },

    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl Error {
    /// Whether the underlying I/O failure was a missing file.
    ///
    /// Used to tell a source that vanished mid-handling apart from a
    /// destination that cannot be written.
    pub fn is_not_found(&self) -> bool {
        let source = match self {
            Self::Scan { source, .. }
            | Self::Copy { source, .. }
            | Self::Relocate { source, .. } => source,
            _ => return false,
        };
        source.kind() == io::ErrorKind::NotFound
    }
}

pub type Result<T> = core::result::Result<T, Error>;
