// src/fsmodel.rs

//! The file-system model: a flat mapping from canonicalized path to file
//! entry, with at most one entry per path.
//!
//! This is deliberately not a tree. The operation engine only ever needs to
//! ask "what's at this path" and "what was at this path", both of which a
//! `BTreeMap<PathBuf, FileEntry>` answers directly; a tree exists to answer
//! subtree questions ("what's under this directory") that this engine does
//! not ask, so one isn't built.

use crate::filesystem::path::sanitize_path;
use crate::hash::Digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata carried alongside a file's content digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub is_symlink: bool,
    pub symlink_target: Option<PathBuf>,
}

impl FileMetadata {
    pub fn regular(mode: u32, size: u64, mtime: DateTime<Utc>) -> Self {
        Self {
            mode,
            uid: 0,
            gid: 0,
            size,
            mtime,
            is_symlink: false,
            symlink_target: None,
        }
    }

    pub fn symlink(target: PathBuf, mtime: DateTime<Utc>) -> Self {
        Self {
            mode: 0o777,
            uid: 0,
            gid: 0,
            size: target.as_os_str().len() as u64,
            mtime,
            is_symlink: true,
            symlink_target: Some(target),
        }
    }
}

/// One entry in the file-system model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub hash: Digest,
    pub metadata: FileMetadata,
}

/// The flat path -> entry mapping.
#[derive(Debug, Default)]
pub struct FileSystemModel {
    entries: BTreeMap<PathBuf, FileEntry>,
}

impl FileSystemModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the entry at `path`, if any. Paths are canonicalized the same
    /// way on every call, so lookups are identity-stable regardless of
    /// leading slashes or redundant separators in the caller's input.
    pub fn find(&self, path: impl AsRef<Path>) -> crate::error::Result<Option<&FileEntry>> {
        let key = sanitize_path(path)?;
        Ok(self.entries.get(&key))
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> crate::error::Result<bool> {
        Ok(self.find(path)?.is_some())
    }

    pub fn get_hash(&self, path: impl AsRef<Path>) -> crate::error::Result<Option<Digest>> {
        Ok(self.find(path)?.map(|e| e.hash))
    }

    /// Set (insert or overwrite) the entry at `path`. There is at most one
    /// entry per path by construction: a second `set` at the same path
    /// replaces, never duplicates.
    pub fn set(
        &mut self,
        path: impl AsRef<Path>,
        entry: FileEntry,
    ) -> crate::error::Result<Option<FileEntry>> {
        let key = sanitize_path(path)?;
        Ok(self.entries.insert(key, entry))
    }

    /// Remove the entry at `path`, returning it if present.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> crate::error::Result<Option<FileEntry>> {
        let key = sanitize_path(path)?;
        Ok(self.entries.remove(&key))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Two models are equivalent when they map the same paths to the same
    /// entries, irrespective of operation history or store internals.
    pub fn equivalent_to(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    fn entry(content: &[u8]) -> FileEntry {
        FileEntry {
            hash: hash(content),
            metadata: FileMetadata::regular(0o644, content.len() as u64, Utc::now()),
        }
    }

    #[test]
    fn set_then_find_roundtrips() {
        let mut model = FileSystemModel::new();
        model.set("a/b.txt", entry(b"content")).unwrap();
        assert!(model.exists("a/b.txt").unwrap());
        assert_eq!(
            model.find("a/b.txt").unwrap().unwrap().hash,
            hash(b"content")
        );
    }

    #[test]
    fn set_at_same_path_replaces_not_duplicates() {
        let mut model = FileSystemModel::new();
        model.set("a.txt", entry(b"one")).unwrap();
        model.set("a.txt", entry(b"two")).unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.find("a.txt").unwrap().unwrap().hash, hash(b"two"));
    }

    #[test]
    fn remove_clears_entry() {
        let mut model = FileSystemModel::new();
        model.set("a.txt", entry(b"content")).unwrap();
        let removed = model.remove("a.txt").unwrap();
        assert!(removed.is_some());
        assert!(!model.exists("a.txt").unwrap());
    }

    #[test]
    fn paths_are_canonicalized_before_use_as_key() {
        let mut model = FileSystemModel::new();
        model.set("/a/b.txt", entry(b"content")).unwrap();
        assert!(model.exists("a/b.txt").unwrap());
    }

    #[test]
    fn equivalence_ignores_nothing_but_the_map_itself() {
        let mut a = FileSystemModel::new();
        let mut b = FileSystemModel::new();
        a.set("x.txt", entry(b"same")).unwrap();
        b.set("x.txt", entry(b"same")).unwrap();
        assert!(a.equivalent_to(&b));

        b.set("y.txt", entry(b"extra")).unwrap();
        assert!(!a.equivalent_to(&b));
    }
}
