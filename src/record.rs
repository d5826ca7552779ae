//! Action records: the markdown files dropped into `Needs_Action/`.
//!
//! Rendering is pure. Persisting is the only side effect, and is skipped
//! entirely in a dry run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::Zoned;
use serde_json::Value;
use tracing::info;

use crate::{
    error::{Error, Result},
    model::{Priority, RecordKind, RecordMeta, Status, WatchedItem},
};

/// Prefix of every action record file name.
const RECORD_PREFIX: &str = "FILE";

/// Longest source stem kept in a record file name, in characters.
const MAX_STEM_CHARS: usize = 40;

/// Characters that change meaning at the start of a YAML scalar.
const YAML_INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
    '`',
];

/// Second-resolution stamp shared by inbox copies and record names.
pub fn stamp(at: &Zoned) -> String {
    at.strftime("%Y%m%d_%H%M%S").to_string()
}

/// Record file name: `FILE_<stamp>_<stem>.md`, stem cut to 40 characters.
///
/// Sorts by arrival time across the whole queue directory.
pub fn record_file_name(stamp: &str, item: &WatchedItem) -> String {
    let stem: String = item.stem().chars().take(MAX_STEM_CHARS).collect();
    format!("{RECORD_PREFIX}_{stamp}_{stem}.md")
}

/// Size for display: `1,234 bytes`, or `unknown` when unreadable.
pub fn format_size(size_bytes: Option<u64>) -> String {
    let Some(bytes) = size_bytes else {
        return "unknown".to_string();
    };

    let digits = bytes.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{grouped} bytes")
}

/// Metadata block for an item copied to `inbox_name` at `received`.
fn metadata(item: &WatchedItem, inbox_name: &str, received: &Zoned) -> RecordMeta {
    RecordMeta {
        kind: RecordKind::FileDrop,
        source_name: item.name.clone(),
        inbox_path: inbox_name.to_string(),
        size: format_size(item.size_bytes),
        extension: item.extension.clone(),
        received: received.strftime("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        priority: Priority::default(),
        status: Status::default(),
    }
}

/// Render the full action record document.
pub fn render(item: &WatchedItem, inbox_name: &str, received: &Zoned) -> Result<String> {
    let meta = metadata(item, inbox_name, received);
    let mut doc = front_matter(&meta)?;

    let kind = if item.extension.is_empty() {
        "unknown"
    } else {
        item.extension.as_str()
    };

    doc.push_str(&format!(
        "
## New File Received

A file has been dropped into the watch folder and is ready for processing.

| Field     | Value |
|-----------|-------|
| Name      | `{name}` |
| Size      | {size} |
| Type      | `{kind}` |
| Received  | {received} |
| Inbox     | `Inbox/{inbox}` |

## Suggested Actions
- [ ] Review the file contents
- [ ] Determine action required
- [ ] Move to /Done when complete

## Notes
_Add any notes about this file here._
",
        name = table_cell(&item.name),
        size = meta.size,
        kind = table_cell(kind),
        received = received.strftime("%Y-%m-%d %H:%M:%S"),
        inbox = table_cell(inbox_name),
    ));

    Ok(doc)
}

/// Write a rendered record into `dir`. A dry run only reports the path.
pub fn persist(dir: &Path, file_name: &str, text: &str, dry_run: bool) -> Result<PathBuf> {
    let path = dir.join(file_name);

    if dry_run {
        info!(path = %path.display(), "[DRY RUN] would create action record");
        return Ok(path);
    }

    fs::write(&path, text).map_err(|source| Error::WriteRecord {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// `---` delimited `key: value` block, in struct field order.
fn front_matter(meta: &RecordMeta) -> Result<String> {
    let Value::Object(fields) = serde_json::to_value(meta)? else {
        return Err(Error::Render(<serde_json::Error as serde::ser::Error>::custom(
            "record metadata must serialize to a map",
        )));
    };

    let mut block = String::from("---\n");
    for (key, value) in fields {
        let value = match value {
            Value::String(s) => yaml_scalar(&s)?,
            other => other.to_string(),
        };
        block.push_str(&format!("{key}: {value}\n"));
    }
    block.push_str("---\n");
    Ok(block)
}

/// A value safe to place after `key: `.
///
/// Plain when YAML would read it back as the same string; otherwise a
/// double-quoted JSON string, which is also a valid YAML scalar.
fn yaml_scalar(s: &str) -> Result<String> {
    let needs_quoting = s.is_empty()
        || resolves_to_non_string(s)
        || s.chars().any(char::is_control)
        || s.contains(": ")
        || s.contains(" #")
        || s.ends_with(':')
        || s.starts_with(YAML_INDICATORS)
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
        || s == "...";

    if needs_quoting {
        Ok(serde_json::to_string(s)?)
    } else {
        Ok(s.to_string())
    }
}

/// Whether a plain scalar would load as null, a boolean, a number, or a date.
///
/// Covers YAML 1.1 as well as 1.2, so `yes`, `0x1F` and `1_000` count. Errs
/// toward quoting: anything digit-led made only of number-ish characters.
fn resolves_to_non_string(s: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "~", "null", "true", "false", "yes", "no", "on", "off", "y", "n", ".inf", "+.inf",
        "-.inf", ".nan",
    ];
    if KEYWORDS.iter().any(|k| s.eq_ignore_ascii_case(k)) {
        return true;
    }

    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let number_ish = |c: char| {
        c.is_ascii_hexdigit() || matches!(c, '.' | '_' | ':' | '-' | '+' | 'x' | 'X' | 'o' | 'O')
    };
    unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && unsigned.chars().any(|c| c.is_ascii_digit())
        && unsigned.chars().all(number_ish)
}

/// Neutralize characters that would break a table row or code span.
fn table_cell(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\r' | '\n' => " ".to_string(),
            '|' => "\\|".to_string(),
            '`' => "'".to_string(),
            c => c.to_string(),
        })
        .collect()
}
