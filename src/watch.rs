//! The watch loop: the supervisory cycle shared by every watcher.
//!
//! Each tick checks the emergency stop marker, asks the watcher for new
//! items, hands each one to the watcher's action step, logs the outcome,
//! and sleeps. Nothing that goes wrong inside a tick ends the loop; only a
//! [`Shutdown`] does.

mod filesystem;

pub use filesystem::{COMPONENT, FilesystemWatcher};

use std::{
    path::Path,
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    act::Outcome,
    error::Result,
    model::WatchedItem,
    storage::{LogEvent, Logbook, Vault},
};

/// A watcher the loop can drive.
///
/// The loop depends only on this trait, never on a concrete watcher.
pub trait Watcher {
    /// Component name used in log entries.
    fn name(&self) -> &str;

    /// Sleep between ticks.
    fn interval(&self) -> Duration;

    /// New items to process this tick.
    fn check_for_updates(&mut self) -> Result<Vec<WatchedItem>>;

    /// Process one item.
    fn create_action_file(&self, item: &WatchedItem) -> Result<Outcome>;

    /// Called once when the stop marker appears.
    fn pause(&mut self) {}

    /// Called once when the stop marker goes away.
    fn resume(&mut self) {}
}

/// Cooperative cancellation, shared between the signal handler and the loop.
///
/// Sleeping through [`Shutdown::sleep`] wakes up as soon as it is triggered.
#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: Mutex<bool>,
    wake: Condvar,
}

impl Shutdown {
    pub fn trigger(&self) {
        let mut triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        *triggered = true;
        self.wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `duration`. Returns `true` if shut down meanwhile.
    pub fn sleep(&self, duration: Duration) -> bool {
        let triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        let (triggered, _) = self
            .wake
            .wait_timeout_while(triggered, duration, |t| !*t)
            .unwrap_or_else(PoisonError::into_inner);
        *triggered
    }
}

/// How one item was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reported {
    Created,
    Skipped,
    Failed,
}

/// Totals for one tick that ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    fn add(&mut self, reported: Reported) {
        match reported {
            Reported::Created => self.created += 1,
            Reported::Skipped => self.skipped += 1,
            Reported::Failed => self.failed += 1,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The stop marker is present; nothing was observed.
    Halted,

    Ran(Tally),
}

/// Log one handling result to the console and the daily logbook.
///
/// Shared by the tick loop and the event-driven workers so both leave the
/// same trail.
pub fn report(logbook: &Logbook, item: &WatchedItem, result: &Result<Outcome>) -> Reported {
    match result {
        Ok(Outcome::Recorded(record)) => {
            let name = file_name(record);
            info!(record = %name, "created action file");
            logbook.record(LogEvent::ActionCreated, &name);
            Reported::Created
        }
        Ok(Outcome::AlreadySeen(earlier)) => {
            debug!(
                path = %item.path.display(),
                record = ?earlier.as_deref().map(file_name),
                "skipped duplicate"
            );
            Reported::Skipped
        }
        Ok(Outcome::Vanished) => Reported::Skipped,
        Err(e) => {
            error!(path = %item.path.display(), error = %e, "failed to handle new file");
            logbook.record(LogEvent::Error, &e.to_string());
            Reported::Failed
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Drives a [`Watcher`] until shut down.
pub struct WatchLoop {
    vault: Vault,
    logbook: Logbook,
    shutdown: Arc<Shutdown>,
    stop_backoff: Duration,
    halted: bool,
}

impl WatchLoop {
    pub fn new(
        vault: Vault,
        logbook: Logbook,
        shutdown: Arc<Shutdown>,
        stop_backoff: Duration,
    ) -> Self {
        Self {
            vault,
            logbook,
            shutdown,
            stop_backoff,
            halted: false,
        }
    }

    /// Tick until shut down.
    pub fn run(&mut self, watcher: &mut dyn Watcher) {
        info!(
            watcher = watcher.name(),
            vault = %self.vault.root().display(),
            interval = ?watcher.interval(),
            "starting"
        );

        while !self.shutdown.is_triggered() {
            let pause = match self.tick(watcher) {
                Tick::Halted => self.stop_backoff,
                Tick::Ran(tally) => {
                    if tally != Tally::default() {
                        debug!(
                            created = tally.created,
                            skipped = tally.skipped,
                            failed = tally.failed,
                            "tick complete"
                        );
                    }
                    watcher.interval()
                }
            };
            if self.shutdown.sleep(pause) {
                break;
            }
        }

        info!(watcher = watcher.name(), "stopped by user");
    }

    /// One pass: stop check, observe, process.
    pub fn tick(&mut self, watcher: &mut dyn Watcher) -> Tick {
        if self.vault.is_halted() {
            if !self.halted {
                warn!(
                    marker = %self.vault.stop_file().display(),
                    "stop marker detected; halting until it is removed"
                );
                watcher.pause();
                self.halted = true;
            }
            return Tick::Halted;
        }
        if self.halted {
            info!("stop marker removed; resuming");
            watcher.resume();
            self.halted = false;
        }

        let mut tally = Tally::default();

        let items = match watcher.check_for_updates() {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "error in check loop");
                self.logbook.record(LogEvent::Error, &e.to_string());
                tally.add(Reported::Failed);
                return Tick::Ran(tally);
            }
        };

        for item in &items {
            let result = watcher.create_action_file(item);
            tally.add(report(&self.logbook, item, &result));
        }

        Tick::Ran(tally)
    }
}
