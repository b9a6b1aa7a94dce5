// src/error.rs

//! Error taxonomy for the reversible file-operation engine.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes the engine can surface.
///
/// Each variant corresponds to one of the recovery classes documented
/// alongside the operation engine: local precondition failures carry no
/// side effects, `IoFailure` may require compensation, `ContentUnavailable`
/// is terminal for undo, and `InvalidState` latches the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// No entry exists at the given path, or no operation record exists for a
    /// given id.
    #[error("not found: {0}")]
    NotFound(String),

    /// An entry already exists where the caller expected none (e.g. `create`
    /// on an occupied path).
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// An operation's metadata record lacks the fields its kind requires to
    /// be undone.
    #[error("insufficient metadata for undo of {kind} at {path}")]
    InsufficientMetadata { kind: String, path: PathBuf },

    /// Undo requires content that is no longer retrievable from the store
    /// (most commonly: obliterated).
    #[error("content unavailable for undo: {0}")]
    ContentUnavailable(String),

    /// The engine, transaction, or store has reached a state from which the
    /// requested operation cannot proceed; an axiomatic invariant (e.g. hash
    /// injectivity) was violated, or a transaction was asked to transition
    /// out of order.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A configured resource bound (store capacity, overwrite pass count)
    /// would be or was exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// An underlying I/O operation failed.
    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// Two operations or transactions conflict (e.g. concurrent writer, lock
    /// held by another process).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A path escapes the managed root or otherwise fails sanitization.
    #[error("path traversal attempt: {0}")]
    PathTraversal(String),

    /// A path is empty or otherwise structurally invalid.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Cooperative cancellation was observed before a mutation began.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A record failed CRC or hash verification on read.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// JSON (de)serialization of a journal, audit, or proof record failed.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Delta generation or application failed.
    #[error("delta error: {0}")]
    Delta(String),
}
