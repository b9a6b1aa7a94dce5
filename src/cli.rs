// src/cli.rs

//! The CLI surface contract: the verbs external tooling invokes this
//! engine through, and the exit-code category each error kind maps to.
//!
//! Argument parsing, terminal output formatting, and the interactive shell
//! itself are out of scope here — this module only fixes the vocabulary
//! and the success/failure contract a wrapping binary or another process
//! would rely on.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// One of the engine's command-line verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Init,
    Status,
    History,
    Delete,
    Modify,
    Move,
    Copy,
    Create,
    Undo,
    Begin,
    Commit,
    Rollback,
    Preview,
    Obliterate,
}

impl Verb {
    pub const ALL: [Verb; 14] = [
        Verb::Init,
        Verb::Status,
        Verb::History,
        Verb::Delete,
        Verb::Modify,
        Verb::Move,
        Verb::Copy,
        Verb::Create,
        Verb::Undo,
        Verb::Begin,
        Verb::Commit,
        Verb::Rollback,
        Verb::Preview,
        Verb::Obliterate,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Verb::Init => "init",
            Verb::Status => "status",
            Verb::History => "history",
            Verb::Delete => "delete",
            Verb::Modify => "modify",
            Verb::Move => "move",
            Verb::Copy => "copy",
            Verb::Create => "create",
            Verb::Undo => "undo",
            Verb::Begin => "begin",
            Verb::Commit => "commit",
            Verb::Rollback => "rollback",
            Verb::Preview => "preview",
            Verb::Obliterate => "obliterate",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::InvalidState(format!("unknown verb: {s}")))
    }
}

/// The exit-code category a verb invocation maps to. A wrapping binary
/// translates these to actual process exit codes; this engine only
/// commits to the category, not the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCategory {
    Success,
    NotFound,
    AlreadyExists,
    InsufficientMetadata,
    ContentUnavailable,
    InvalidState,
    ResourceExhausted,
    IoFailure,
    Conflict,
    UsageError,
}

impl From<&Error> for ExitCategory {
    fn from(error: &Error) -> Self {
        match error {
            Error::NotFound(_) => ExitCategory::NotFound,
            Error::AlreadyExists(_) => ExitCategory::AlreadyExists,
            Error::InsufficientMetadata { .. } => ExitCategory::InsufficientMetadata,
            Error::ContentUnavailable(_) => ExitCategory::ContentUnavailable,
            Error::InvalidState(_) => ExitCategory::InvalidState,
            Error::ResourceExhausted(_) => ExitCategory::ResourceExhausted,
            Error::IoFailure(_) => ExitCategory::IoFailure,
            Error::Conflict(_) => ExitCategory::Conflict,
            Error::PathTraversal(_) | Error::InvalidPath(_) | Error::Cancelled(_) => {
                ExitCategory::UsageError
            }
            Error::ChecksumMismatch { .. } => ExitCategory::InvalidState,
            Error::Serialization(_) => ExitCategory::IoFailure,
            Error::Delta(_) => ExitCategory::InvalidState,
        }
    }
}

impl ExitCategory {
    /// Whether this category represents success. Every non-success
    /// category is a distinct non-zero exit code a wrapping binary can
    /// key off; this engine itself never picks the numbers.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCategory::Success)
    }
}
