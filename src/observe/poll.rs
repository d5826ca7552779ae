//! Polling strategy: enumerate the drop folder once per tick.

use std::{fs, path::Path, sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    act::{ArrivalHandler, SeenSet},
    error::{Error, Result},
    model::WatchedItem,
};

use super::{Observer, PLACEHOLDER, Strategy};

/// New regular files directly inside `dir`.
///
/// Skips subdirectories (including `_processed/`), the placeholder file,
/// and anything already claimed in `seen`. Order is whatever the
/// filesystem yields; callers must not depend on it.
///
/// Entries that vanish mid-scan are skipped. Only an unreadable `dir`
/// itself is an error.
pub fn scan(dir: &Path, seen: &SeenSet) -> Result<Vec<WatchedItem>> {
    let read_dir = fs::read_dir(dir).map_err(|source| Error::Scan {
        path: dir.to_path_buf(),
        source,
    })?;

    let items = read_dir
        .filter_map(|entry| {
            let entry = entry.ok()?;
            if entry.file_name() == PLACEHOLDER {
                return None;
            }

            let path = entry.path();
            // Follows symlinks: a link to a regular file counts as a file.
            let Ok(metadata) = fs::metadata(&path) else {
                debug!(path = %path.display(), "entry vanished during scan");
                return None;
            };
            if !metadata.is_file() || seen.contains(&path) {
                return None;
            }

            Some(WatchedItem::with_size(path, Some(metadata.len())))
        })
        .collect();

    Ok(items)
}

/// Fixed-interval directory enumeration.
pub struct PollObserver {
    handler: Arc<ArrivalHandler>,
    interval: Duration,
}

impl PollObserver {
    pub fn new(handler: Arc<ArrivalHandler>, interval: Duration) -> Self {
        Self { handler, interval }
    }
}

impl Observer for PollObserver {
    fn strategy(&self) -> Strategy {
        Strategy::Polling
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn check_for_updates(&mut self) -> Result<Vec<WatchedItem>> {
        scan(self.handler.drop_dir(), self.handler.seen())
    }
}
