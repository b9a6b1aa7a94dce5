// src/config.rs

//! Environment-derived configuration.
//!
//! Configuration *files* are out of scope; only three environment variables
//! are consulted, and unknown variables are ignored entirely. This mirrors
//! the engine's "no hidden config surface" stance: a managed root is either
//! named explicitly by the caller or taken from `JANUSKEY_ROOT`, the minimum
//! overwrite pass count either comes from the caller or from
//! `JANUSKEY_MIN_PASSES`, and `JANUSKEY_LOG` is left for the embedding
//! application's own `tracing` subscriber to interpret.

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const ENV_ROOT: &str = "JANUSKEY_ROOT";
pub const ENV_MIN_PASSES: &str = "JANUSKEY_MIN_PASSES";
pub const ENV_LOG: &str = "JANUSKEY_LOG";

pub const MIN_OVERWRITE_PASSES: u32 = 3;

/// Resolve the managed-root override, if set.
pub fn managed_root_override() -> Option<PathBuf> {
    env::var_os(ENV_ROOT).map(PathBuf::from)
}

/// Resolve the minimum-overwrite-passes override, if set and valid.
///
/// A value below [`MIN_OVERWRITE_PASSES`] is rejected rather than silently
/// clamped: obliteration policy is security-relevant and a typo should fail
/// loudly.
pub fn min_overwrite_passes_override() -> Result<Option<u32>> {
    let Some(raw) = env::var_os(ENV_MIN_PASSES) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .ok_or_else(|| Error::InvalidState(format!("{ENV_MIN_PASSES} is not valid UTF-8")))?;
    let passes: u32 = raw
        .parse()
        .map_err(|_| Error::InvalidState(format!("{ENV_MIN_PASSES} is not a valid integer")))?;
    if passes < MIN_OVERWRITE_PASSES {
        return Err(Error::InvalidState(format!(
            "{ENV_MIN_PASSES}={passes} is below the minimum of {MIN_OVERWRITE_PASSES}"
        )));
    }
    Ok(Some(passes))
}

/// The verbosity hint, passed through unparsed for the embedding
/// application's subscriber.
pub fn log_hint() -> Option<String> {
    env::var(ENV_LOG).ok()
}
