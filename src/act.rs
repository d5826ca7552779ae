//! Arrival handling: turn one dropped file into an inbox copy and an action record.
//!
//! For each new file:
//!
//! 1. Claim the path in the seen set (atomic check-and-mark, before any I/O).
//! 2. Copy it into `Inbox/` as `<stamp>_<name>`, whitespace folded to `_`.
//! 3. Write the action record into `Needs_Action/`.
//! 4. Move the original into `<drop>/_processed/` so it is never rediscovered.
//!
//! A dry run performs step 1 and logs the rest without touching the disk.
//!
//! Known limitation: two files with the same name arriving within the same
//! second map to the same inbox name, and the later copy wins.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use filetime::FileTime;
use jiff::Zoned;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    model::WatchedItem,
    record,
    storage::{self, Vault},
};

/// Holding area for handled originals, inside the drop folder.
pub const PROCESSED_DIR: &str = "_processed";

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An action record was written (or would be, in a dry run).
    Recorded(PathBuf),

    /// The path was claimed earlier in this process.
    ///
    /// Carries the earlier record once that handling has finished.
    AlreadySeen(Option<PathBuf>),

    /// The source disappeared before it could be copied.
    Vanished,
}

/// Result of trying to claim a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// First sighting; the caller now owns handling this path.
    Fresh,

    /// Someone already claimed it.
    Seen(Option<PathBuf>),
}

/// Source paths this process has claimed, and the record each produced.
///
/// Lives as long as the handler; never persisted. A claimed path is never
/// handled twice, even if the claim ended in failure.
#[derive(Debug, Default)]
pub struct SeenSet {
    entries: Mutex<HashMap<PathBuf, Option<PathBuf>>>,
}

impl SeenSet {
    /// Check and mark `path` in one step.
    pub fn claim(&self, path: &Path) -> Claim {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(path) {
            Some(record) => Claim::Seen(record.clone()),
            None => {
                entries.insert(path.to_path_buf(), None);
                Claim::Fresh
            }
        }
    }

    /// Attach the finished record to a claimed path.
    pub fn finish(&self, path: &Path, record: PathBuf) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(path.to_path_buf(), Some(record));
    }

    pub fn contains(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(path)
    }
}

/// Handles arrivals for one drop folder. Shared across threads via `Arc`.
#[derive(Debug)]
pub struct ArrivalHandler {
    drop_dir: PathBuf,
    inbox: PathBuf,
    needs_action: PathBuf,
    dry_run: bool,
    seen: SeenSet,
}

impl ArrivalHandler {
    pub fn new(drop_dir: impl Into<PathBuf>, vault: &Vault, dry_run: bool) -> Self {
        Self {
            drop_dir: drop_dir.into(),
            inbox: vault.inbox(),
            needs_action: vault.needs_action(),
            dry_run,
            seen: SeenSet::default(),
        }
    }

    pub fn drop_dir(&self) -> &Path {
        &self.drop_dir
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Handle one item. Idempotent per source path.
    ///
    /// A source that vanished is not an error. An unwritable inbox, queue,
    /// or processed directory is.
    pub fn handle(&self, item: &WatchedItem) -> Result<Outcome> {
        if let Claim::Seen(record) = self.seen.claim(&item.path) {
            debug!(path = %item.path.display(), "already handled");
            return Ok(Outcome::AlreadySeen(record));
        }

        let now = Zoned::now();
        debug!(
            path = %item.path.display(),
            discovered_at = %item.discovered_at,
            "handling new file"
        );
        let stamp = record::stamp(&now);
        let inbox_name = inbox_name(&stamp, &item.name);
        let inbox_dest = self.inbox.join(&inbox_name);

        if self.dry_run {
            if !item.path.exists() {
                return Ok(vanished(item));
            }
            info!(
                file = %item.name,
                dest = %inbox_dest.display(),
                "[DRY RUN] would copy to inbox"
            );
        } else {
            // The vault is shared with people; a deleted inbox comes back.
            storage::ensure_dir(&self.inbox, false)?;
            match copy_preserving(&item.path, &inbox_dest) {
                Ok(()) => info!(file = %item.name, dest = %inbox_dest.display(), "copied to inbox"),
                Err(e) if e.is_not_found() && !item.path.exists() => return Ok(vanished(item)),
                Err(e) => return Err(e),
            }
        }

        let text = record::render(item, &inbox_name, &now)?;
        let file_name = record::record_file_name(&stamp, item);
        if !self.dry_run {
            storage::ensure_dir(&self.needs_action, false)?;
        }
        let record_path = record::persist(&self.needs_action, &file_name, &text, self.dry_run)?;

        if self.dry_run {
            info!(
                file = %item.name,
                dest = %self.processed_dir().display(),
                "[DRY RUN] would move original out of the drop folder"
            );
        } else {
            self.relocate(item)?;
        }

        self.seen.finish(&item.path, record_path.clone());
        Ok(Outcome::Recorded(record_path))
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.drop_dir.join(PROCESSED_DIR)
    }

    /// Move the original into `_processed/`, replacing any older namesake.
    fn relocate(&self, item: &WatchedItem) -> Result<()> {
        let processed = self.processed_dir();
        storage::ensure_dir(&processed, false)?;

        let dest = processed.join(&item.name);
        match fs::rename(&item.path, &dest) {
            Ok(()) => Ok(()),
            // Copied and recorded already; someone else moved it meanwhile.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !item.path.exists() => {
                warn!(path = %item.path.display(), "original vanished before it could be moved");
                Ok(())
            }
            Err(source) => Err(Error::Relocate {
                from: item.path.clone(),
                to: dest,
                source,
            }),
        }
    }
}

/// Inbox name: `<stamp>_<name>` with every whitespace character replaced.
pub fn inbox_name(stamp: &str, name: &str) -> String {
    format!("{stamp}_{}", name.replace(char::is_whitespace, "_"))
}

fn vanished(item: &WatchedItem) -> Outcome {
    warn!(path = %item.path.display(), "file vanished before it could be copied; skipping");
    Outcome::Vanished
}

/// Copy contents and permissions, then carry over access and modification times.
fn copy_preserving(from: &Path, to: &Path) -> Result<()> {
    let copy_err = |source| Error::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let meta = fs::metadata(from).map_err(copy_err)?;
    fs::copy(from, to).map_err(copy_err)?;

    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    if let Err(e) = filetime::set_file_times(to, atime, mtime) {
        debug!(path = %to.display(), error = %e, "could not preserve file times");
    }
    Ok(())
}
