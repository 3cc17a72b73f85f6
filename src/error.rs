//! Error types for z-agent store and file operations
//!
//! Lookups that miss return `None`/`false` through the store API; the
//! variants here cover real failures (I/O, bad YAML, frontmatter rejected
//! in strict mode) that surface as error-flagged tool responses.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Malformed frontmatter in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
