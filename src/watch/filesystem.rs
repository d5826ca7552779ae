//! The drop-folder watcher: glues an observation strategy to the arrival handler.

use std::{sync::Arc, time::Duration};

use crate::{
    act::{ArrivalHandler, Outcome},
    error::Result,
    model::WatchedItem,
    observe::{Observer, Strategy},
};

use super::Watcher;

/// Component name written to every log entry.
pub const COMPONENT: &str = "FilesystemWatcher";

/// Watches one drop folder and records every file that lands in it.
pub struct FilesystemWatcher {
    handler: Arc<ArrivalHandler>,
    observer: Box<dyn Observer>,
}

impl FilesystemWatcher {
    pub fn new(handler: Arc<ArrivalHandler>, observer: Box<dyn Observer>) -> Self {
        Self { handler, observer }
    }

    pub fn strategy(&self) -> Strategy {
        self.observer.strategy()
    }
}

impl Watcher for FilesystemWatcher {
    fn name(&self) -> &str {
        COMPONENT
    }

    fn interval(&self) -> Duration {
        self.observer.interval()
    }

    fn check_for_updates(&mut self) -> Result<Vec<WatchedItem>> {
        self.observer.check_for_updates()
    }

    fn create_action_file(&self, item: &WatchedItem) -> Result<Outcome> {
        self.handler.handle(item)
    }

    fn pause(&mut self) {
        self.observer.pause();
    }

    fn resume(&mut self) {
        self.observer.resume();
    }
}
