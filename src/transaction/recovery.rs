// src/transaction/recovery.rs

//! Crash recovery: on startup, find transactions whose journal shows a
//! `TransactionBegun` record with no matching commit or rollback, and roll
//! them back. A transaction only ever reaches a state outside the model
//! through a durable barrier record, so an incomplete transaction can
//! always be undone from the journal alone.

use crate::error::Result;
use crate::fsmodel::FileSystemModel;
use crate::operation::OperationEngine;
use crate::transaction::journal::{JournalRecord, TransactionJournal};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No incomplete transactions found.
    Clean,
    /// An incomplete transaction was found and its operations undone.
    RolledBack(Uuid),
    /// An incomplete transaction was found but one of its operations could
    /// not be undone (its content was obliterated in the meantime); the
    /// journal is marked rolled back regardless, since there is nothing
    /// further recovery can do.
    PartiallyRolledBack(Uuid),
}

/// Recover every incomplete transaction found in `journal`, undoing their
/// operations against `model` via `engine`.
pub fn recover_all(
    journal: &TransactionJournal,
    engine: &OperationEngine,
    model: &mut FileSystemModel,
) -> Result<Vec<RecoveryOutcome>> {
    let incomplete = journal.incomplete_transactions()?;
    if incomplete.is_empty() {
        return Ok(vec![RecoveryOutcome::Clean]);
    }

    let mut outcomes = Vec::new();
    for tx in incomplete {
        outcomes.push(recover_single(journal, engine, model, tx)?);
    }
    Ok(outcomes)
}

fn recover_single(
    journal: &TransactionJournal,
    engine: &OperationEngine,
    model: &mut FileSystemModel,
    tx: Uuid,
) -> Result<RecoveryOutcome> {
    let operations = journal.operations_for(tx)?;

    let mut partial = false;
    for op in operations.iter().rev() {
        match engine.undo(model, op) {
            Ok(()) => journal.record_undo(op.id)?,
            Err(err) => {
                warn!(%tx, path = %op.path.display(), error = %err, "could not undo operation during recovery");
                partial = true;
            }
        }
    }

    journal.write_barrier(&JournalRecord::TransactionRolledBack { id: tx })?;

    if partial {
        Ok(RecoveryOutcome::PartiallyRolledBack(tx))
    } else {
        info!(%tx, "recovered incomplete transaction");
        Ok(RecoveryOutcome::RolledBack(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::ContentStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, OperationEngine, TransactionJournal) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::new(dir.path().join("objects")).unwrap());
        let engine = OperationEngine::new(store, Arc::new(SystemClock));
        let journal = TransactionJournal::open(dir.path().join("history.log")).unwrap();
        (dir, engine, journal)
    }

    #[test]
    fn clean_journal_reports_clean() {
        let (_dir, engine, journal) = setup();
        let mut model = FileSystemModel::new();
        let outcomes = recover_all(&journal, &engine, &mut model).unwrap();
        assert_eq!(outcomes, vec![RecoveryOutcome::Clean]);
    }

    #[test]
    fn incomplete_transaction_is_rolled_back() {
        let (_dir, engine, journal) = setup();
        let mut model = FileSystemModel::new();
        let tx = Uuid::new_v4();

        journal
            .write_barrier(&JournalRecord::TransactionBegun { id: tx })
            .unwrap();
        let op = engine
            .apply_create(&mut model, "a.txt", b"hello", 0o644)
            .unwrap();
        journal
            .write(&JournalRecord::Operation {
                transaction: Some(tx),
                metadata: op,
            })
            .unwrap();

        assert!(model.exists("a.txt").unwrap());

        let outcomes = recover_all(&journal, &engine, &mut model).unwrap();
        assert_eq!(outcomes, vec![RecoveryOutcome::RolledBack(tx)]);
        assert!(!model.exists("a.txt").unwrap());
        assert!(journal.incomplete_transactions().unwrap().is_empty());

        let history = journal.history().unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].undone);
    }

    #[test]
    fn partial_recovery_when_content_obliterated() {
        let (_dir, engine, journal) = setup();
        let mut model = FileSystemModel::new();
        let tx = Uuid::new_v4();

        journal
            .write_barrier(&JournalRecord::TransactionBegun { id: tx })
            .unwrap();
        let create = engine
            .apply_create(&mut model, "a.txt", b"secret", 0o644)
            .unwrap();
        journal
            .write(&JournalRecord::Operation {
                transaction: Some(tx),
                metadata: create,
            })
            .unwrap();
        let delete = engine.apply_delete(&mut model, "a.txt").unwrap();
        journal
            .write(&JournalRecord::Operation {
                transaction: Some(tx),
                metadata: delete.clone(),
            })
            .unwrap();

        engine
            .store()
            .remove_secure(&delete.previous_hash.unwrap(), 3)
            .unwrap();

        let outcomes = recover_all(&journal, &engine, &mut model).unwrap();
        assert_eq!(outcomes, vec![RecoveryOutcome::PartiallyRolledBack(tx)]);
    }
}
