//! Runtime configuration.
//!
//! Each setting resolves through a chain, first match wins:
//!
//! 1. Command-line flag (`--vault`, `--drop`, `--interval`, `--mode`, `--dry-run`)
//! 2. Environment variable (`VAULT_PATH`, `DROP_PATH`, `WATCH_INTERVAL`,
//!    `WATCH_MODE`, `DRY_RUN`)
//! 3. Built-in default: `~/AI_Employee_Vault`, `~/drop_folder`, 5 seconds,
//!    auto mode, live run.
//!
//! Steps 1 and 2 are handled by clap; this module applies the defaults,
//! normalizes paths, and prepares the directories before the loop starts.

use std::{
    fs,
    path::{self, Component, Path, PathBuf},
    time::Duration,
};

use tracing::info;

use crate::{
    cli::Cli,
    error::{Error, Result},
    observe::WatchMode,
    storage::{self, Vault},
};

const DEFAULT_VAULT_DIR: &str = "AI_Employee_Vault";
const DEFAULT_DROP_DIR: &str = "drop_folder";

/// Wait after a creation event before touching the file.
const GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Loop interval in event-driven mode, where ticks only check the stop marker.
const EVENT_TICK: Duration = Duration::from_secs(1);

/// Sleep between checks while the stop marker is present.
const STOP_BACKOFF: Duration = Duration::from_secs(10);

/// Fully resolved settings for one watcher process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Vault root: `Inbox/`, `Needs_Action/`, `Logs/`, `STOP.md`.
    pub vault: PathBuf,

    /// Folder watched for new files.
    pub drop_dir: PathBuf,

    pub mode: WatchMode,

    /// Log intended actions without touching the drop, inbox, or queue.
    pub dry_run: bool,

    pub poll_interval: Duration,
    pub event_tick: Duration,
    pub grace_period: Duration,
    pub stop_backoff: Duration,
}

impl Config {
    /// Resolve parsed flags (already merged with the environment by clap).
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.interval == 0 {
            return Err(Error::InvalidInterval);
        }

        let vault = match &cli.vault {
            Some(path) => resolve_path(path)?,
            None => home_dir()?.join(DEFAULT_VAULT_DIR),
        };
        let drop_dir = match &cli.drop_dir {
            Some(path) => resolve_path(path)?,
            None => home_dir()?.join(DEFAULT_DROP_DIR),
        };

        Ok(Self {
            vault,
            drop_dir,
            mode: cli.mode.to_domain(),
            dry_run: cli.dry_run,
            poll_interval: Duration::from_secs(cli.interval),
            event_tick: EVENT_TICK,
            grace_period: GRACE_PERIOD,
            stop_backoff: STOP_BACKOFF,
        })
    }

    pub fn vault(&self) -> Vault {
        Vault::new(&self.vault)
    }

    /// Create every directory the watcher needs, then pin both roots to
    /// their canonical paths.
    ///
    /// Outside a dry run each one must also be writable. Any failure here is
    /// fatal: the loop never starts against a broken layout. Canonical roots
    /// keep scanned paths and notification paths comparable when the drop
    /// folder sits behind a symlink.
    pub fn prepare(&mut self) -> Result<()> {
        let probe = !self.dry_run;
        self.vault().prepare(probe)?;
        storage::ensure_dir(&self.drop_dir, probe)?;

        self.vault = canonical(&self.vault)?;
        self.drop_dir = canonical(&self.drop_dir)?;

        info!(
            drop = %self.drop_dir.display(),
            inbox = %self.vault().inbox().display(),
            dry_run = self.dry_run,
            "directories ready"
        );
        if self.dry_run {
            info!("[DRY RUN MODE] no files will be written");
        }
        Ok(())
    }
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(Error::NoHomeDir)
}

fn canonical(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|source| Error::InvalidPath {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand a leading `~` and make the path absolute.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    let expanded = match components.next() {
        Some(Component::Normal(first)) if first == "~" => home_dir()?.join(components.as_path()),
        _ => path.to_path_buf(),
    };

    path::absolute(&expanded).map_err(|source| Error::InvalidPath {
        path: expanded,
        source,
    })
}

#[cfg(test)]
impl Config {
    /// Everything under `root`, with timings shrunk for tests.
    pub fn rooted(root: &Path) -> Self {
        Self {
            vault: root.join("vault"),
            drop_dir: root.join("drop"),
            mode: WatchMode::Auto,
            dry_run: false,
            poll_interval: Duration::from_millis(20),
            event_tick: Duration::from_millis(20),
            grace_period: Duration::from_millis(20),
            stop_backoff: Duration::from_millis(20),
        }
    }
}
