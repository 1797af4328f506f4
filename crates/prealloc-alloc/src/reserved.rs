//! The reserved directory that holds filler units.

use prealloc_error::{PreallocError, Result};
use prealloc_types::RESERVED_DIR_NAME;
use std::fs::{self, DirBuilder};
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::info;

const RESERVED_DIR_MODE: u32 = 0o755;

/// `<volume>/.preallocation`.
///
/// Invariant: when present, the path is a directory. Anything else at that
/// path is a configuration error on both the grow and the shrink path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedDir {
    path: PathBuf,
}

impl ReservedDir {
    #[must_use]
    pub fn for_volume(volume: &Path) -> Self {
        Self {
            path: volume.join(RESERVED_DIR_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory if it does not exist yet (grow path).
    pub fn ensure(&self) -> Result<()> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(PreallocError::configuration(
                &self.path,
                "exists but is not a directory",
            )),
            Err(_) => {
                DirBuilder::new()
                    .mode(RESERVED_DIR_MODE)
                    .create(&self.path)
                    .map_err(|err| {
                        PreallocError::configuration(
                            &self.path,
                            format!("cannot create directory: {err}"),
                        )
                    })?;
                info!(dir = %self.path.display(), "created reserved directory");
                Ok(())
            }
        }
    }

    /// Fail unless the directory already exists (shrink path).
    pub fn require(&self) -> Result<()> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(PreallocError::configuration(
                &self.path,
                "exists but is not a directory",
            )),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(PreallocError::configuration(
                &self.path,
                "reserved directory not found",
            )),
            Err(err) => Err(PreallocError::configuration(
                &self.path,
                format!("cannot stat reserved directory: {err}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_missing_directory() {
        let volume = tempfile::tempdir().unwrap();
        let reserved = ReservedDir::for_volume(volume.path());
        assert_eq!(reserved.path(), volume.path().join(".preallocation"));

        reserved.ensure().unwrap();
        assert!(reserved.path().is_dir());

        // Second call sees the existing directory.
        reserved.ensure().unwrap();
        reserved.require().unwrap();
    }

    #[test]
    fn regular_file_in_the_way_is_configuration_error() {
        let volume = tempfile::tempdir().unwrap();
        let reserved = ReservedDir::for_volume(volume.path());
        fs::write(reserved.path(), b"not a directory").unwrap();

        assert!(matches!(
            reserved.ensure(),
            Err(PreallocError::Configuration { .. })
        ));
        assert!(matches!(
            reserved.require(),
            Err(PreallocError::Configuration { .. })
        ));
    }

    #[test]
    fn require_does_not_create() {
        let volume = tempfile::tempdir().unwrap();
        let reserved = ReservedDir::for_volume(volume.path());

        let err = reserved.require().unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
        assert!(!reserved.path().exists());
    }

    #[test]
    fn uncreatable_directory_is_configuration_error() {
        let scratch = tempfile::tempdir().unwrap();
        let volume = scratch.path().join("plain-file");
        fs::write(&volume, b"").unwrap();

        let err = ReservedDir::for_volume(&volume).ensure().unwrap_err();
        match err {
            PreallocError::Configuration { detail, .. } => {
                assert!(detail.starts_with("cannot create directory"), "{detail}");
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }
}
