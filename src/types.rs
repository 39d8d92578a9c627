use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

use crate::path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A node in the remote file tree, as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
}

impl DirectoryEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size: None,
            hash: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            size: None,
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn name(&self) -> &str {
        path::basename(&self.path)
    }
}

/// Contents of a resolved path. A `File` listing is a preview target and has no entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    pub path: String,
    pub kind: EntryKind,
    pub hash: Option<String>,
    pub entries: Vec<DirectoryEntry>,
}

impl DirectoryListing {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }
}

/// Where a transfer fetches from and what the resulting artifact is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    Bytes(Vec<u8>),
    Local(PathBuf),
}

/// One file to write. `path` is relative to the upload root unless rooted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub path: String,
    pub source: UploadSource,
}

impl UploadEntry {
    pub fn bytes(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            source: UploadSource::Bytes(data.into()),
        }
    }

    pub fn local(path: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: UploadSource::Local(file.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Name,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Sort preference for listing entries. Directories always come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sorting {
    pub by: SortBy,
    pub order: SortOrder,
}

impl Sorting {
    /// Selecting the active key flips the order; a new key starts ascending.
    pub fn select(&mut self, by: SortBy) {
        if self.by == by {
            self.order = match self.order {
                SortOrder::Ascending => SortOrder::Descending,
                SortOrder::Descending => SortOrder::Ascending,
            };
        } else {
            self.by = by;
            self.order = SortOrder::Ascending;
        }
    }

    pub fn compare(&self, a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
        let dirs_first = b.is_dir().cmp(&a.is_dir());
        if dirs_first != Ordering::Equal {
            return dirs_first;
        }
        let ord = match self.by {
            SortBy::Name => a.name().to_lowercase().cmp(&b.name().to_lowercase()),
            SortBy::Size => a.size.unwrap_or(0).cmp(&b.size.unwrap_or(0)),
        };
        match self.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }

    pub fn apply(&self, entries: &mut [DirectoryEntry]) {
        entries.sort_by(|a, b| self.compare(a, b));
    }
}
