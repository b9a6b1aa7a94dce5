// src/lib.rs

//! JanusKey: a reversible file-operation engine over content-addressed
//! storage, with an orthogonal primitive for secure, irreversible erasure.
//!
//! Every mutating operation (`create`, `delete`, `modify`, `move`, `copy`,
//! and the less common `chmod`/`mkdir`/`rmdir`/`symlink`/`append`/
//! `truncate`/`touch`) records enough metadata to be undone. Undo stays
//! available indefinitely, with one exception: content that has gone
//! through [`obliteration`] is gone for good, and any undo that would need
//! it fails rather than silently succeeding with stale or missing bytes.
//!
//! # Architecture
//!
//! - [`hash`] — the single SHA-256 hash primitive everything else is built on
//! - [`store`] — content-addressed storage with tombstone-tracked secure removal
//! - [`fsmodel`] — the path -> entry mapping operations act on
//! - [`operation`] — apply/undo for each operation kind
//! - [`transaction`] — grouping operations under single-writer, crash-safe commit/rollback
//! - [`obliteration`] — secure erasure with a verifiable, content-free audit trail
//! - [`managed`] — the on-disk `.januskey/` layout tying the above together
//! - [`cli`] — the verb and exit-category contract external tooling relies on

pub mod cli;
pub mod clock;
pub mod config;
pub mod delta;
pub mod error;
pub mod filesystem;
pub mod fsmodel;
pub mod hash;
pub mod managed;
pub mod obliteration;
pub mod operation;
pub mod store;
pub mod transaction;

pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use fsmodel::{FileEntry, FileMetadata, FileSystemModel};
pub use hash::Digest;
pub use managed::ManagedRoot;
pub use obliteration::{ErasureRequest, ErasureResponse, ObliterationProof, ObliterationService};
pub use operation::{OperationEngine, OperationKind, OperationMetadata};
pub use store::ContentStore;
pub use transaction::{Transaction, TransactionEngine, TransactionState};
