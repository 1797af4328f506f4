#![forbid(unsafe_code)]
//! Error types for prealloc.
//!
//! # Error Taxonomy
//!
//! | Variant | Raised by | When |
//! |---------|-----------|------|
//! | `Configuration` | allocator, reclaimer | reserved path is not a directory, is missing on the shrink path, or cannot be created |
//! | `Io` | allocator, reclaimer | create, write, random fill, sync, list, or delete failed |
//! | `Statistics` | volume inspector | `statvfs` failed or its numbers overflow |
//! | `Clock` | allocator | the wall clock reads before the Unix epoch, so no unit name exists |
//!
//! Every variant is fatal for the run. Nothing is retried and nothing already
//! written or deleted is rolled back; the binary logs the error once and exits
//! with [`PreallocError::exit_code`].
//!
//! Two conditions look like failures but are not errors and never appear
//! here: a unit operation that runs past the slow-unit limit (the run stops
//! early and succeeds), and a shrink step that finds no reclaimable unit (the
//! step is a no-op).

use std::path::Path;
use thiserror::Error;

/// Unified error type for all prealloc operations.
#[derive(Debug, Error)]
pub enum PreallocError {
    /// The reserved directory is unusable.
    #[error("configuration error at {path}: {detail}")]
    Configuration { path: String, detail: String },

    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Volume statistics could not be read for `path`.
    #[error("cannot read volume statistics for {path}")]
    Statistics {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("clock error: {0}")]
    Clock(String),
}

impl PreallocError {
    pub fn configuration(path: &Path, detail: impl Into<String>) -> Self {
        Self::Configuration {
            path: path.display().to_string(),
            detail: detail.into(),
        }
    }

    pub fn statistics(path: &Path, source: std::io::Error) -> Self {
        Self::Statistics {
            path: path.display().to_string(),
            source,
        }
    }

    /// Process exit status for this error.
    ///
    /// All variants are fatal and share status 1; the match stays exhaustive
    /// so a new variant has to pick its status explicitly.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::Io(_) | Self::Statistics { .. } | Self::Clock(_) => 1,
        }
    }
}

/// Result alias using `PreallocError`.
pub type Result<T> = std::result::Result<T, PreallocError>;
