//! Core data model for dropwatch.
//!
//! Two kinds of things flow through the pipeline: items seen in the drop
//! folder, and the action records written for them.

mod item;
mod record;

pub use item::WatchedItem;
pub use record::{Priority, RecordKind, RecordMeta, Status};
