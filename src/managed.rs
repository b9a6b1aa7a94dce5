// src/managed.rs

//! Layout and bootstrap of a managed root: a `.januskey/` directory holding
//! the content store, the operation-history journal, the obliteration audit
//! log, and a small state file tracking the active transaction and the last
//! applied operation id.

use crate::error::Result;
use crate::obliteration::AuditLog;
use crate::store::ContentStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DOT_DIR: &str = ".januskey";
pub const OBJECTS_DIR: &str = "objects";
pub const HISTORY_LOG: &str = "history.log";
pub const AUDIT_LOG: &str = "audit.log";
pub const STATE_FILE: &str = "state";

/// Small persisted pointer into the operation history: which transaction,
/// if any, is currently open, and the id of the last operation applied
/// outside of one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagedState {
    pub active_transaction: Option<Uuid>,
    pub last_applied_id: Option<Uuid>,
}

/// A bootstrapped managed root: `<root>/.januskey/{objects,history.log,audit.log,state}`.
pub struct ManagedRoot {
    root: PathBuf,
    dot_dir: PathBuf,
}

impl ManagedRoot {
    /// Initialize (or re-open) a managed root at `root`. Idempotent:
    /// calling this on an already-initialized root just confirms the
    /// layout is present.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dot_dir = root.join(DOT_DIR);
        fs::create_dir_all(dot_dir.join(OBJECTS_DIR))?;

        for log in [HISTORY_LOG, AUDIT_LOG] {
            let path = dot_dir.join(log);
            if !path.exists() {
                fs::File::create(&path)?;
            }
        }

        let state_path = dot_dir.join(STATE_FILE);
        if !state_path.exists() {
            let initial = ManagedState::default();
            fs::write(&state_path, serde_json::to_vec(&initial)?)?;
        }

        Ok(Self { root, dot_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.dot_dir.join(OBJECTS_DIR)
    }

    pub fn history_log_path(&self) -> PathBuf {
        self.dot_dir.join(HISTORY_LOG)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.dot_dir.join(AUDIT_LOG)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dot_dir.join(STATE_FILE)
    }

    pub fn open_content_store(&self) -> Result<ContentStore> {
        ContentStore::new(self.objects_dir())
    }

    pub fn open_audit_log(&self) -> Result<AuditLog> {
        AuditLog::open(self.audit_log_path())
    }

    pub fn read_state(&self) -> Result<ManagedState> {
        let bytes = fs::read(self.state_path())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write_state(&self, state: &ManagedState) -> Result<()> {
        let tmp = self.state_path().with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(state)?)?;
        fs::rename(&tmp, self.state_path())?;
        Ok(())
    }

    /// Whether `root` already has a `.januskey` directory.
    pub fn exists_at(root: impl AsRef<Path>) -> bool {
        root.as_ref().join(DOT_DIR).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_full_layout() {
        let dir = TempDir::new().unwrap();
        let managed = ManagedRoot::init(dir.path()).unwrap();

        assert!(managed.objects_dir().is_dir());
        assert!(managed.history_log_path().is_file());
        assert!(managed.audit_log_path().is_file());
        assert!(managed.state_path().is_file());
        assert!(ManagedRoot::exists_at(dir.path()));
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        ManagedRoot::init(dir.path()).unwrap();
        let managed = ManagedRoot::init(dir.path()).unwrap();
        assert!(managed.objects_dir().is_dir());
    }

    #[test]
    fn state_roundtrips_through_write_and_read() {
        let dir = TempDir::new().unwrap();
        let managed = ManagedRoot::init(dir.path()).unwrap();

        let mut state = managed.read_state().unwrap();
        assert!(state.active_transaction.is_none());

        let tx_id = Uuid::new_v4();
        state.active_transaction = Some(tx_id);
        managed.write_state(&state).unwrap();

        let reloaded = managed.read_state().unwrap();
        assert_eq!(reloaded.active_transaction, Some(tx_id));
    }
}
