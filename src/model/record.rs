//! Action record metadata: the front matter of a `Needs_Action` file.
//!
//! Field order here is the order written to disk.

use serde::Serialize;

/// Metadata block at the top of an action record.
///
/// Written once; a reviewer changes `status` out-of-band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMeta {
    #[serde(rename = "type")]
    pub kind: RecordKind,

    /// Original file name as dropped.
    pub source_name: String,

    /// Name of the copy inside `Inbox/`.
    pub inbox_path: String,

    /// Human-readable size, or `unknown`.
    pub size: String,

    /// Lowercase extension with dot, or empty.
    pub extension: String,

    /// ISO-8601 receipt time.
    pub received: String,

    pub priority: Priority,

    pub status: Status,
}

/// What produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A file landed in the drop folder.
    FileDrop,
}

/// Triage priority. Reviewers raise or lower it by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
}

/// Where a record stands with its reviewer.
///
/// Only the initial state is ever written here; later states are set
/// out-of-band by whoever works the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
}
