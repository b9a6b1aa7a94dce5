// src/filesystem/mod.rs

//! Path handling shared by the content store, the file-system model, and
//! the operation engine.

pub mod path;

pub use path::{safe_join, sanitize_filename, sanitize_path};
