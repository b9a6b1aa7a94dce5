// src/transaction/mod.rs

//! Transaction engine: groups a sequence of operations so they commit or
//! roll back as a unit, under single-writer enforcement.
//!
//! A transaction acquires an exclusive lock on the managed root (so two
//! writers can never interleave operations), writes a durable
//! `TransactionBegun` barrier, applies operations while journaling each
//! one, and closes with a durable `TransactionCommitted` or
//! `TransactionRolledBack` barrier. A transaction dropped without an
//! explicit `commit` or `rollback` rolls back automatically, the same way
//! an unclosed database transaction would.

pub mod journal;
pub mod recovery;

use crate::error::{Error, Result};
use crate::fsmodel::FileSystemModel;
use crate::operation::{OperationEngine, OperationMetadata};
use crate::transaction::journal::{JournalRecord, TransactionJournal};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Holds the managed root's exclusive lock for the lifetime of a
/// transaction. Released automatically on drop.
struct TransactionLock {
    file: File,
}

impl TransactionLock {
    /// Acquire the lock, retrying with exponential backoff rather than
    /// failing on the first contention — a concurrent writer is expected
    /// to hold the lock only briefly.
    fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path)?;

        let mut delay = Duration::from_millis(10);
        for attempt in 0..5 {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(_) if attempt < 4 => {
                    debug!(attempt, "managed root locked, retrying");
                    thread::sleep(delay);
                    delay *= 2;
                }
                Err(_) => {
                    return Err(Error::Conflict(
                        "managed root is locked by another writer".into(),
                    ));
                }
            }
        }
        unreachable!("loop always returns")
    }
}

impl Drop for TransactionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Coordinates transactions against one operation engine, journal, and
/// file-system model.
pub struct TransactionEngine {
    journal: TransactionJournal,
    lock_path: PathBuf,
}

impl TransactionEngine {
    pub fn new(journal: TransactionJournal, lock_path: PathBuf) -> Self {
        Self { journal, lock_path }
    }

    pub fn journal(&self) -> &TransactionJournal {
        &self.journal
    }

    /// Begin a transaction. Blocks (with backoff) until the managed root's
    /// lock is free.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let lock = TransactionLock::acquire(&self.lock_path)?;
        let id = Uuid::new_v4();
        self.journal
            .write_barrier(&JournalRecord::TransactionBegun { id })?;
        debug!(%id, "transaction begun");
        Ok(Transaction {
            id,
            journal: &self.journal,
            operations: Vec::new(),
            state: TransactionState::Active,
            _lock: lock,
        })
    }
}

/// An open transaction. Every `record_*` call journals one operation;
/// `commit` and `rollback` consume the transaction and close it durably.
pub struct Transaction<'a> {
    id: Uuid,
    journal: &'a TransactionJournal,
    operations: Vec<OperationMetadata>,
    state: TransactionState,
    _lock: TransactionLock,
}

impl<'a> Transaction<'a> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn operations(&self) -> &[OperationMetadata] {
        &self.operations
    }

    /// Record that `metadata` was applied as part of this transaction.
    /// Callers apply the operation against the engine and model themselves
    /// (via [`OperationEngine`]) and pass the resulting record here so the
    /// transaction can journal it and, if needed, undo it on rollback.
    pub fn record(&mut self, metadata: OperationMetadata) -> Result<()> {
        self.journal.write(&JournalRecord::Operation {
            transaction: Some(self.id),
            metadata: metadata.clone(),
        })?;
        self.operations.push(metadata);
        Ok(())
    }

    pub fn commit(mut self) -> Result<()> {
        self.journal
            .write_barrier(&JournalRecord::TransactionCommitted { id: self.id })?;
        self.state = TransactionState::Committed;
        debug!(id = %self.id, "transaction committed");
        Ok(())
    }

    /// Undo every operation recorded so far, in reverse order, against
    /// `engine`/`model`, marking each one undone in the journal, then close
    /// the transaction durably.
    pub fn rollback(mut self, engine: &OperationEngine, model: &mut FileSystemModel) -> Result<()> {
        engine.undo_sequence(model, &self.operations)?;
        for op in self.operations.iter().rev() {
            self.journal.record_undo(op.id)?;
        }
        self.journal
            .write_barrier(&JournalRecord::TransactionRolledBack { id: self.id })?;
        self.state = TransactionState::RolledBack;
        debug!(id = %self.id, "transaction rolled back");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            warn!(
                id = %self.id,
                "transaction dropped without commit or rollback; leaving an incomplete record for recovery"
            );
        }
    }
}
