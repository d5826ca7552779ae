//! Watched items: one file seen in the drop folder.

use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::Timestamp;

/// A file discovered in the watch location.
///
/// Transient: lives for one handling cycle. Identity is the source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedItem {
    /// Absolute path in the drop folder.
    pub path: PathBuf,

    /// File name, lossily decoded.
    pub name: String,

    /// Size at discovery. `None` when metadata could not be read.
    pub size_bytes: Option<u64>,

    /// Lowercase extension with its leading dot, or empty.
    pub extension: String,

    /// When the item was discovered.
    pub discovered_at: Timestamp,
}

impl WatchedItem {
    /// Build an item for `path`, reading its size from the filesystem.
    ///
    /// Never fails: an unreadable file simply has no size.
    pub fn discover(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let size_bytes = fs::metadata(&path).ok().map(|m| m.len());
        Self::with_size(path, size_bytes)
    }

    /// Build an item with an already-known size.
    pub fn with_size(path: PathBuf, size_bytes: Option<u64>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&path);

        Self {
            path,
            name,
            size_bytes,
            extension,
            discovered_at: Timestamp::now(),
        }
    }

    /// File name without its final extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn discover_reads_size_and_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Report V1.PDF");
        fs::write(&path, "hello world").unwrap();

        let item = WatchedItem::discover(&path);

        assert_eq!(item.path, path);
        assert_eq!(item.name, "Report V1.PDF");
        assert_eq!(item.size_bytes, Some(11));
        assert_eq!(item.extension, ".pdf");
        assert_eq!(item.stem(), "Report V1");
    }

    #[test]
    fn missing_file_has_no_size() {
        let item = WatchedItem::discover("/nonexistent/drop/ghost.txt");

        assert_eq!(item.name, "ghost.txt");
        assert_eq!(item.size_bytes, None);
    }

    #[test]
    fn no_extension_is_empty() {
        let item = WatchedItem::with_size(PathBuf::from("/drop/Makefile"), Some(1));
        assert_eq!(item.extension, "");
        assert_eq!(item.stem(), "Makefile");

        // Leading-dot names are all stem.
        let item = WatchedItem::with_size(PathBuf::from("/drop/.env"), Some(1));
        assert_eq!(item.extension, "");
        assert_eq!(item.stem(), ".env");
    }
}
