//! Observation strategies: how new files in the drop folder are discovered.
//!
//! Two interchangeable implementations of [`Observer`]:
//!
//! - [`EventObserver`] subscribes to OS change notifications and hands each
//!   created file to the arrival handler as it lands.
//! - [`PollObserver`] enumerates the drop folder once per tick.
//!
//! The strategy is chosen once, at startup, by [`select`].

mod events;
mod poll;

pub use events::EventObserver;
pub use poll::{PollObserver, scan};

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    act::ArrivalHandler, config::Config, error::Result, model::WatchedItem, storage::Logbook,
};

/// Placeholder kept in otherwise-empty drop folders; never treated as a drop.
pub const PLACEHOLDER: &str = ".gitkeep";

/// Which strategy the operator asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Event-driven when the platform supports it, polling otherwise.
    #[default]
    Auto,

    /// Always poll.
    Polling,
}

/// Which strategy is actually running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Events,
    Polling,
}

/// A source of newly arrived items, driven by the watch loop.
pub trait Observer {
    fn strategy(&self) -> Strategy;

    /// How long the loop sleeps between ticks.
    fn interval(&self) -> Duration;

    /// Items discovered since the previous call.
    fn check_for_updates(&mut self) -> Result<Vec<WatchedItem>>;

    /// The stop marker appeared.
    fn pause(&mut self) {}

    /// The stop marker was removed.
    fn resume(&mut self) {}
}

/// Pick the observation strategy for this run.
///
/// An unavailable notification facility is not an error: it is logged and
/// polling takes over.
pub fn select(
    config: &Config,
    handler: &Arc<ArrivalHandler>,
    logbook: &Logbook,
) -> Box<dyn Observer> {
    let poll = || -> Box<dyn Observer> {
        Box::new(PollObserver::new(Arc::clone(handler), config.poll_interval))
    };

    match config.mode {
        WatchMode::Polling => {
            info!(interval = ?config.poll_interval, "polling mode");
            poll()
        }
        WatchMode::Auto => match EventObserver::start(
            Arc::clone(handler),
            logbook.clone(),
            config.grace_period,
            config.event_tick,
        ) {
            Ok(observer) => {
                info!("event-driven mode");
                Box::new(observer)
            }
            Err(e) => {
                warn!(error = %e, "change notification unavailable; falling back to polling");
                poll()
            }
        },
    }
}
