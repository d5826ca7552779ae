//! Command-line interface for dropwatch.
//!
//! A single long-running command: watch the drop folder, copy each new file
//! into the vault inbox, and queue an action record for it. Every flag has an
//! environment variable counterpart; flags win.

use std::{path::PathBuf, sync::Arc};

use clap::{ArgAction, Parser, ValueEnum, builder::BoolishValueParser};
use tracing::info;

use crate::{
    act::ArrivalHandler,
    config::Config,
    error::Result,
    observe::{self, WatchMode},
    storage::Logbook,
    watch::{COMPONENT, FilesystemWatcher, Shutdown, WatchLoop},
};

/// Dropwatch: turn files dropped into a folder into queued action records.
#[derive(Debug, Parser)]
#[command(name = "dropwatch", version, after_long_help = LAYOUT_HELP)]
pub struct Cli {
    /// Vault root holding Inbox/, Needs_Action/, Logs/ and the STOP.md marker.
    /// Defaults to ~/AI_Employee_Vault.
    #[arg(long, env = "VAULT_PATH")]
    pub vault: Option<PathBuf>,

    /// Folder to watch for new files. Defaults to ~/drop_folder.
    #[arg(long = "drop", env = "DROP_PATH")]
    pub drop_dir: Option<PathBuf>,

    /// Seconds between scans in polling mode.
    #[arg(long, env = "WATCH_INTERVAL", default_value_t = 5)]
    pub interval: u64,

    /// Observation strategy.
    #[arg(long, env = "WATCH_MODE", value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Log what would happen without copying, moving, or writing anything.
    #[arg(
        long,
        env = "DRY_RUN",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,
}

const LAYOUT_HELP: &str = r"Vault layout:
  <vault>/Inbox/          copies of dropped files, named <stamp>_<name>
  <vault>/Needs_Action/   one FILE_<stamp>_<stem>.md record per file
  <vault>/Logs/           daily activity logs, <YYYY-MM-DD>.log
  <vault>/STOP.md         while present, nothing is processed

Handled originals move to <drop>/_processed/.

Examples:
  dropwatch --drop ~/Downloads/inbox
  DRY_RUN=true dropwatch --mode polling --interval 2";

/// CLI-facing watch mode, mapped to the domain `WatchMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// OS change notifications, falling back to polling when unavailable.
    Auto,
    /// Scan the folder on a fixed interval.
    Polling,
}

impl ModeArg {
    pub fn to_domain(self) -> WatchMode {
        match self {
            Self::Auto => WatchMode::Auto,
            Self::Polling => WatchMode::Polling,
        }
    }
}

/// Resolve configuration, prepare the vault, and watch until interrupted.
pub fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::from_cli(cli)?;
    config.prepare()?;

    let vault = config.vault();
    let handler = Arc::new(ArrivalHandler::new(&config.drop_dir, &vault, config.dry_run));
    let logbook = Logbook::new(vault.logs(), COMPONENT);

    let shutdown = Arc::new(Shutdown::default());
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.trigger())?;
    }

    let observer = observe::select(&config, &handler, &logbook);
    let mut watcher = FilesystemWatcher::new(handler, observer);
    info!(
        strategy = ?watcher.strategy(),
        drop = %config.drop_dir.display(),
        "watching; press Ctrl+C to stop"
    );

    WatchLoop::new(vault, logbook, shutdown, config.stop_backoff).run(&mut watcher);

    // Ends the subscription and waits for in-flight arrivals.
    drop(watcher);
    Ok(())
}
