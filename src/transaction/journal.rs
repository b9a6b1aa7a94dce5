// src/transaction/journal.rs

//! The operation-history journal: an append-only, CRC32-checksummed record
//! of every operation applied, inside or outside a transaction.
//!
//! Each line is `{crc32_hex}|{json}\n`. `write` appends without forcing a
//! sync; `write_barrier` additionally calls `sync_data`, used at the points
//! where a crash must not be allowed to lose the record (opening and
//! closing a transaction). This mirrors the durability discipline of a
//! write-ahead log: ordinary operation records can tolerate being lost on
//! an unclean shutdown as long as they're simply absent from history, but
//! transaction boundaries must be durable so recovery can tell a committed
//! transaction from an abandoned one.

use crate::error::Result;
use crate::operation::OperationMetadata;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// One line of journal history: either a transaction boundary marker, an
/// applied operation, or a tombstone-style follow-up marking a previously
/// journaled operation as undone.
///
/// Operation records are never deleted or rewritten in place; undoing one
/// appends an `OperationUndone` record referencing its id instead, so
/// `Applied -> Undone` is reconstructible by replaying the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JournalRecord {
    TransactionBegun {
        id: Uuid,
    },
    Operation {
        transaction: Option<Uuid>,
        metadata: OperationMetadata,
    },
    OperationUndone {
        operation_id: Uuid,
    },
    TransactionCommitted {
        id: Uuid,
    },
    TransactionRolledBack {
        id: Uuid,
    },
}

pub struct TransactionJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl TransactionJournal {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append(&self, record: &JournalRecord, barrier: bool) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let crc = crc32fast::hash(json.as_bytes());
        let line = format!("{crc:08x}|{json}\n");

        let mut file = self.file.lock().expect("lock poisoned");
        file.write_all(line.as_bytes())?;
        if barrier {
            file.sync_data()?;
        }
        Ok(())
    }

    pub fn write(&self, record: &JournalRecord) -> Result<()> {
        self.append(record, false)
    }

    pub fn write_barrier(&self, record: &JournalRecord) -> Result<()> {
        self.append(record, true)
    }

    /// Mark a previously journaled operation as undone by appending a
    /// tombstone-style follow-up record, rather than rewriting or removing
    /// its original `Operation` entry.
    pub fn record_undo(&self, operation_id: Uuid) -> Result<()> {
        self.write(&JournalRecord::OperationUndone { operation_id })
    }

    /// Reconstruct full operation history from the log: every `Operation`
    /// record, with `undone` set on any whose id has a matching
    /// `OperationUndone` follow-up, in the order they were applied.
    pub fn history(&self) -> Result<Vec<OperationMetadata>> {
        let records = self.read_all()?;
        let mut undone_ids = std::collections::HashSet::new();
        for record in &records {
            if let JournalRecord::OperationUndone { operation_id } = record {
                undone_ids.insert(*operation_id);
            }
        }

        Ok(records
            .into_iter()
            .filter_map(|record| match record {
                JournalRecord::Operation { metadata, .. } => Some(metadata),
                _ => None,
            })
            .map(|mut metadata| {
                metadata.undone = undone_ids.contains(&metadata.id);
                metadata
            })
            .collect())
    }

    /// Read every well-formed record, skipping any line whose checksum
    /// doesn't match (a torn write from a crash mid-append) rather than
    /// failing the whole read.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let Some((crc_hex, json)) = line.split_once('|') else {
                continue;
            };
            let Ok(expected_crc) = u32::from_str_radix(crc_hex, 16) else {
                continue;
            };
            if crc32fast::hash(json.as_bytes()) != expected_crc {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(json) {
                Ok(record) => records.push(record),
                Err(_) => continue,
            }
        }
        Ok(records)
    }

    /// Operations recorded for a given transaction id, in application
    /// order, restricted to those not already known to be rolled back or
    /// committed elsewhere — callers decide what to do with the boundary
    /// records themselves.
    pub fn operations_for(&self, transaction: Uuid) -> Result<Vec<OperationMetadata>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter_map(|record| match record {
                JournalRecord::Operation {
                    transaction: Some(tx),
                    metadata,
                } if tx == transaction => Some(metadata),
                _ => None,
            })
            .collect())
    }

    /// Transaction ids that have a `TransactionBegun` record but no
    /// matching `TransactionCommitted`/`TransactionRolledBack` — the set a
    /// recovery pass must resolve.
    pub fn incomplete_transactions(&self) -> Result<Vec<Uuid>> {
        let records = self.read_all()?;
        let mut begun = Vec::new();
        let mut resolved = std::collections::HashSet::new();

        for record in &records {
            match record {
                JournalRecord::TransactionBegun { id } => begun.push(*id),
                JournalRecord::TransactionCommitted { id }
                | JournalRecord::TransactionRolledBack { id } => {
                    resolved.insert(*id);
                }
                JournalRecord::Operation { .. } => {}
                JournalRecord::OperationUndone { .. } => {}
            }
        }
        Ok(begun
            .into_iter()
            .filter(|id| !resolved.contains(id))
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::fsmodel::FileSystemModel;
    use crate::operation::OperationEngine;
    use crate::store::ContentStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn journal() -> (TempDir, TransactionJournal) {
        let dir = TempDir::new().unwrap();
        let journal = TransactionJournal::open(dir.path().join("history.log")).unwrap();
        (dir, journal)
    }

    #[test]
    fn records_roundtrip_through_write_and_read() {
        let (_dir, journal) = journal();
        let tx = Uuid::new_v4();
        journal
            .write_barrier(&JournalRecord::TransactionBegun { id: tx })
            .unwrap();
        journal
            .write_barrier(&JournalRecord::TransactionCommitted { id: tx })
            .unwrap();

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn incomplete_transaction_detected_without_closing_record() {
        let (_dir, journal) = journal();
        let tx = Uuid::new_v4();
        journal
            .write_barrier(&JournalRecord::TransactionBegun { id: tx })
            .unwrap();

        let incomplete = journal.incomplete_transactions().unwrap();
        assert_eq!(incomplete, vec![tx]);
    }

    #[test]
    fn committed_transaction_is_not_incomplete() {
        let (_dir, journal) = journal();
        let tx = Uuid::new_v4();
        journal
            .write_barrier(&JournalRecord::TransactionBegun { id: tx })
            .unwrap();
        journal
            .write_barrier(&JournalRecord::TransactionCommitted { id: tx })
            .unwrap();

        assert!(journal.incomplete_transactions().unwrap().is_empty());
    }

    #[test]
    fn operations_for_filters_by_transaction_id() {
        let (dir, journal) = journal();
        let store = Arc::new(ContentStore::new(dir.path().join("objects")).unwrap());
        let engine = OperationEngine::new(store, Arc::new(SystemClock));
        let mut model = FileSystemModel::new();

        let tx = Uuid::new_v4();
        let op = engine
            .apply_create(&mut model, "a.txt", b"x", 0o644)
            .unwrap();
        journal
            .write(&JournalRecord::Operation {
                transaction: Some(tx),
                metadata: op,
            })
            .unwrap();
        journal
            .write(&JournalRecord::Operation {
                transaction: None,
                metadata: engine
                    .apply_create(&mut model, "b.txt", b"y", 0o644)
                    .unwrap(),
            })
            .unwrap();

        let ops = journal.operations_for(tx).unwrap();
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn history_marks_undone_operations_without_erasing_the_original_record() {
        let (dir, journal) = journal();
        let store = Arc::new(ContentStore::new(dir.path().join("objects")).unwrap());
        let engine = OperationEngine::new(store, Arc::new(SystemClock));
        let mut model = FileSystemModel::new();

        engine
            .apply_create(&mut model, "a.txt", b"hello", 0o644)
            .unwrap();
        let delete = engine.apply_delete(&mut model, "a.txt").unwrap();
        journal
            .write(&JournalRecord::Operation {
                transaction: None,
                metadata: delete.clone(),
            })
            .unwrap();

        engine.undo(&mut model, &delete).unwrap();
        journal.record_undo(delete.id).unwrap();

        let history = journal.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, delete.id);
        assert!(history[0].undone);

        let raw = journal.read_all().unwrap();
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn corrupted_trailing_line_is_skipped() {
        let (dir, journal) = journal();
        let tx = Uuid::new_v4();
        journal
            .write_barrier(&JournalRecord::TransactionBegun { id: tx })
            .unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join("history.log"))
            .unwrap();
        writeln!(file, "ffffffff|{{truncated").unwrap();

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 1);
    }
}
