//! Event-driven strategy: OS change notifications via `notify`.
//!
//! A dispatcher thread receives raw events and queues each arrival for a
//! single worker thread. The worker waits until the arrival's grace period
//! has passed (the writer may still be busy) and then calls the arrival
//! handler directly, outside the tick loop. A burst of arrivals costs one
//! queue entry each, not one thread each.
//!
//! The tick loop still polls this observer, but only to collect catch-up
//! scans: one at startup for files already waiting, one after each resume
//! for files that landed while the stop marker was present, and one after
//! the backend reports lost events.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use tracing::{debug, info, warn};

use crate::{
    act::ArrivalHandler,
    error::{Error, Result},
    model::WatchedItem,
    storage::Logbook,
    watch,
};

use super::{Observer, PLACEHOLDER, Strategy, scan};

/// Subscription to creation events in the drop folder.
///
/// Dropping it ends the subscription and waits for queued arrivals.
pub struct EventObserver {
    handler: Arc<ArrivalHandler>,
    paused: Arc<AtomicBool>,
    rescan: Arc<AtomicBool>,
    tick: Duration,
    // Dropped first; that closes the dispatcher's channel, which in turn
    // closes the worker's queue.
    watcher: Option<RecommendedWatcher>,
    dispatcher: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

/// One path waiting to be handled.
struct Arrival {
    path: PathBuf,
    seen_at: Instant,
}

/// Filters raw events into the arrival queue.
struct Dispatch {
    drop_dir: PathBuf,
    paused: Arc<AtomicBool>,
    rescan: Arc<AtomicBool>,
    queue: mpsc::Sender<Arrival>,
}

/// Handles queued arrivals one at a time.
struct ArrivalWorker {
    handler: Arc<ArrivalHandler>,
    logbook: Logbook,
    grace: Duration,
}

impl EventObserver {
    /// Subscribe to the handler's drop folder, non-recursively.
    ///
    /// Fails when the platform has no notification facility, the folder
    /// cannot be watched, or the helper threads cannot be started; callers
    /// fall back to polling.
    pub fn start(
        handler: Arc<ArrivalHandler>,
        logbook: Logbook,
        grace: Duration,
        tick: Duration,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(handler.drop_dir(), RecursiveMode::NonRecursive)?;

        let (queue, pending) = mpsc::channel::<Arrival>();
        let worker = ArrivalWorker {
            handler: Arc::clone(&handler),
            logbook,
            grace,
        };
        let worker = spawn("arrival worker", move || worker.run(&pending))?;

        let paused = Arc::new(AtomicBool::new(false));
        // The first check picks up files that were already waiting.
        let rescan = Arc::new(AtomicBool::new(true));
        let dispatch = Dispatch {
            drop_dir: handler.drop_dir().to_path_buf(),
            paused: Arc::clone(&paused),
            rescan: Arc::clone(&rescan),
            queue,
        };
        let dispatcher = spawn("event dispatcher", move || dispatch.run(&rx))?;

        info!(dir = %handler.drop_dir().display(), "watching drop folder for new files");
        Ok(Self {
            handler,
            paused,
            rescan,
            tick,
            watcher: Some(watcher),
            dispatcher: Some(dispatcher),
            worker: Some(worker),
        })
    }
}

fn spawn(name: &'static str, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("dropwatch {name}"))
        .spawn(f)
        .map_err(|source| Error::Spawn { name, source })
}

impl Observer for EventObserver {
    fn strategy(&self) -> Strategy {
        Strategy::Events
    }

    fn interval(&self) -> Duration {
        self.tick
    }

    fn check_for_updates(&mut self) -> Result<Vec<WatchedItem>> {
        if !self.rescan.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        scan(self.handler.drop_dir(), self.handler.seen()).inspect_err(|_| {
            // Try again next tick.
            self.rescan.store(true, Ordering::SeqCst);
        })
    }

    fn pause(&mut self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.paused.store(false, Ordering::SeqCst);
        self.rescan.store(true, Ordering::SeqCst);
    }
}

impl Drop for EventObserver {
    fn drop(&mut self) {
        drop(self.watcher.take());
        for (name, handle) in [
            ("event dispatcher", self.dispatcher.take()),
            ("arrival worker", self.worker.take()),
        ] {
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                warn!(thread = name, "thread panicked");
            }
        }
        debug!("event subscription closed");
    }
}

impl Dispatch {
    /// Runs until the watcher is dropped.
    fn run(self, rx: &mpsc::Receiver<notify::Result<Event>>) {
        for result in rx {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "file watcher error; rescanning drop folder");
                    self.rescan.store(true, Ordering::SeqCst);
                    continue;
                }
            };
            if event.need_rescan() {
                warn!("file watcher dropped events; rescanning drop folder");
                self.rescan.store(true, Ordering::SeqCst);
                continue;
            }
            if !is_arrival(&event.kind) {
                continue;
            }
            if self.paused.load(Ordering::SeqCst) {
                debug!(paths = ?event.paths, "halted; leaving arrival for the catch-up scan");
                continue;
            }

            let seen_at = Instant::now();
            for path in event.paths {
                if !is_candidate(&self.drop_dir, &path) {
                    continue;
                }
                if self.queue.send(Arrival { path, seen_at }).is_err() {
                    // The worker is gone; only a scan can find these now.
                    warn!("arrival worker stopped; rescanning drop folder");
                    self.rescan.store(true, Ordering::SeqCst);
                }
            }
        }
    }
}

impl ArrivalWorker {
    /// Drains the queue in order until the dispatcher goes away.
    fn run(&self, pending: &mpsc::Receiver<Arrival>) {
        for arrival in pending {
            // Best effort: a bounded wait, not proof the writer is done.
            let ready_at = arrival.seen_at + self.grace;
            if let Some(wait) = ready_at.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
            self.arrive(arrival.path);
        }
    }

    fn arrive(&self, path: PathBuf) {
        if !path.is_file() {
            // A directory, or already gone.
            return;
        }
        let item = WatchedItem::discover(path);
        let result = self.handler.handle(&item);
        watch::report(&self.logbook, &item, &result);
    }
}

/// Creations, and renames whose destination is the drop folder.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Direct children of the drop folder, minus the placeholder.
fn is_candidate(drop_dir: &Path, path: &Path) -> bool {
    path.parent() == Some(drop_dir) && path.file_name().is_some_and(|n| n != PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use notify::event::{CreateKind, Flag, RemoveKind};
    use tempfile::TempDir;

    use crate::storage::Vault;

    struct Fixture {
        _dir: TempDir,
        drop_dir: PathBuf,
        vault: Vault,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let drop_dir = dir.path().join("drop");
            fs::create_dir(&drop_dir).unwrap();
            let vault = Vault::new(dir.path().join("vault"));
            vault.prepare(false).unwrap();
            Self {
                _dir: dir,
                drop_dir,
                vault,
            }
        }

        fn start_in(&self, drop_dir: &Path) -> (Arc<ArrivalHandler>, EventObserver) {
            let handler = Arc::new(ArrivalHandler::new(drop_dir, &self.vault, false));
            let logbook = Logbook::new(self.vault.logs(), "FilesystemWatcher");
            let observer = EventObserver::start(
                Arc::clone(&handler),
                logbook,
                Duration::from_millis(50),
                Duration::from_millis(50),
            )
            .unwrap();
            (handler, observer)
        }

        fn start(&self) -> (Arc<ArrivalHandler>, EventObserver) {
            self.start_in(&self.drop_dir)
        }

        fn record_count(&self) -> usize {
            fs::read_dir(self.vault.needs_action()).unwrap().count()
        }

        /// Poll until `n` records exist, or give up after a generous deadline.
        fn wait_for_records(&self, n: usize) -> bool {
            let deadline = Instant::now() + Duration::from_secs(20);
            while Instant::now() < deadline {
                if self.record_count() >= n {
                    return true;
                }
                thread::sleep(Duration::from_millis(25));
            }
            false
        }
    }

    /// Feed `events` through a dispatcher sharing the observer's flags.
    fn dispatch_into(observer: &EventObserver, events: Vec<notify::Result<Event>>) {
        let (queue, _pending) = mpsc::channel();
        let dispatch = Dispatch {
            drop_dir: observer.handler.drop_dir().to_path_buf(),
            paused: Arc::clone(&observer.paused),
            rescan: Arc::clone(&observer.rescan),
            queue,
        };
        let (tx, rx) = mpsc::channel();
        for event in events {
            tx.send(event).unwrap();
        }
        drop(tx);
        dispatch.run(&rx);
    }

    /// Threads in this process, where the platform exposes them.
    fn thread_count() -> Option<usize> {
        fs::read_dir("/proc/self/task").ok().map(Iterator::count)
    }

    #[test]
    fn new_file_is_handled_inline() {
        let fx = Fixture::new();
        let (_handler, mut observer) = fx.start();
        // Nothing was waiting at startup.
        assert!(observer.check_for_updates().unwrap().is_empty());

        fs::write(fx.drop_dir.join("fresh.txt"), "hello").unwrap();

        assert!(fx.wait_for_records(1), "event never produced a record");
        // Events bypass the tick batch.
        assert!(observer.check_for_updates().unwrap().is_empty());

        // Dropping waits for the worker to finish relocating and logging.
        drop(observer);
        assert!(fx.drop_dir.join("_processed").join("fresh.txt").is_file());
        let log: String = fs::read_dir(fx.vault.logs())
            .unwrap()
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        assert!(log.contains("ACTION_CREATED: FILE_"));
    }

    #[test]
    fn burst_is_handled_without_a_thread_per_file() {
        let fx = Fixture::new();
        let (_handler, mut observer) = fx.start();
        assert!(observer.check_for_updates().unwrap().is_empty());
        let before = thread_count();

        let mut peak = 0;
        for i in 0..300 {
            fs::write(fx.drop_dir.join(format!("burst-{i:03}.txt")), "x").unwrap();
            peak = peak.max(thread_count().unwrap_or(0));
        }

        assert!(fx.wait_for_records(300), "burst was not fully recorded");
        if let Some(before) = before {
            // Test harness threads come and go; a per-file design adds hundreds.
            assert!(peak < before + 150, "threads grew from {before} to {peak}");
        }
    }

    #[test]
    fn first_check_returns_files_already_waiting() {
        let fx = Fixture::new();
        fs::write(fx.drop_dir.join("early.txt"), "x").unwrap();
        let (_handler, mut observer) = fx.start();

        let items = observer.check_for_updates().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "early.txt");

        // Only once.
        assert!(observer.check_for_updates().unwrap().is_empty());
    }

    #[test]
    fn arrivals_while_paused_surface_after_resume() {
        let fx = Fixture::new();
        let (_handler, mut observer) = fx.start();
        assert!(observer.check_for_updates().unwrap().is_empty());

        observer.pause();
        fs::write(fx.drop_dir.join("during-stop.txt"), "x").unwrap();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(fx.record_count(), 0, "paused observer must not handle arrivals");

        observer.resume();
        let items = observer.check_for_updates().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "during-stop.txt");
    }

    #[test]
    fn overflow_event_triggers_a_catch_up_scan() {
        let fx = Fixture::new();
        let (_handler, mut observer) = fx.start();
        assert!(observer.check_for_updates().unwrap().is_empty());

        // Lose the real notification for this file.
        observer.pause();
        fs::write(fx.drop_dir.join("lost.txt"), "x").unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(observer.check_for_updates().unwrap().is_empty());

        dispatch_into(
            &observer,
            vec![Ok(Event::new(EventKind::Other).set_flag(Flag::Rescan))],
        );

        let items = observer.check_for_updates().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "lost.txt");
        assert!(observer.check_for_updates().unwrap().is_empty());
    }

    #[test]
    fn watcher_error_triggers_a_catch_up_scan() {
        let fx = Fixture::new();
        let (_handler, mut observer) = fx.start();
        assert!(observer.check_for_updates().unwrap().is_empty());
        observer.pause();
        fs::write(fx.drop_dir.join("lost.txt"), "x").unwrap();

        dispatch_into(&observer, vec![Err(notify::Error::generic("queue overflow"))]);

        let items = observer.check_for_updates().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "lost.txt");
    }

    #[test]
    fn failed_catch_up_scan_is_retried() {
        let fx = Fixture::new();
        fs::write(fx.drop_dir.join("early.txt"), "x").unwrap();
        let (_handler, mut observer) = fx.start();
        let parked = fx.drop_dir.with_extension("parked");
        fs::rename(&fx.drop_dir, &parked).unwrap();

        assert!(observer.check_for_updates().is_err());

        fs::rename(&parked, &fx.drop_dir).unwrap();
        let items = observer.check_for_updates().unwrap();
        assert_eq!(items.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn watching_through_a_symlink_after_canonicalizing() {
        let fx = Fixture::new();
        let link = fx.drop_dir.with_extension("link");
        std::os::unix::fs::symlink(&fx.drop_dir, &link).unwrap();
        let canonical = fs::canonicalize(&link).unwrap();

        let (_handler, mut observer) = fx.start_in(&canonical);
        assert!(observer.check_for_updates().unwrap().is_empty());

        fs::write(link.join("via-link.txt"), "x").unwrap();

        assert!(fx.wait_for_records(1), "event through a symlink was ignored");
    }

    #[test]
    fn missing_folder_cannot_be_watched() {
        let fx = Fixture::new();
        fs::remove_dir(&fx.drop_dir).unwrap();
        let handler = Arc::new(ArrivalHandler::new(&fx.drop_dir, &fx.vault, false));
        let logbook = Logbook::new(fx.vault.logs(), "FilesystemWatcher");

        let result = EventObserver::start(
            handler,
            logbook,
            Duration::from_millis(10),
            Duration::from_millis(10),
        );

        assert!(result.is_err());
    }

    #[test]
    fn only_arrivals_count() {
        assert!(is_arrival(&EventKind::Create(CreateKind::File)));
        assert!(is_arrival(&EventKind::Modify(ModifyKind::Name(
            RenameMode::To
        ))));
        assert!(!is_arrival(&EventKind::Modify(ModifyKind::Name(
            RenameMode::From
        ))));
        assert!(!is_arrival(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn candidates_are_direct_children_minus_placeholder() {
        let drop_dir = Path::new("/drop");
        assert!(is_candidate(drop_dir, Path::new("/drop/a.txt")));
        assert!(!is_candidate(drop_dir, Path::new("/drop/.gitkeep")));
        assert!(!is_candidate(drop_dir, Path::new("/drop/_processed/a.txt")));
        assert!(!is_candidate(drop_dir, Path::new("/elsewhere/a.txt")));
    }
}
