#![forbid(unsafe_code)]
//! Filler unit reclamation.
//!
//! Deletes at most one unit per call. Candidates are regular files in the
//! reserved directory that are at least [`UnitGeometry::min_reclaim_bytes`]
//! long; the victim is the file name that sorts last byte-wise.
//!
//! Unit names are unpadded hex timestamps, so for names of equal length the
//! greatest name is the newest unit. Names of different lengths are still
//! compared as byte strings, never as numbers.
//!
//! [`ReclaimOutcome::Deleted`] reports the name lossily converted to UTF-8.

use prealloc_alloc::ReservedDir;
use prealloc_error::Result;
use prealloc_types::{UnitGeometry, UnitName};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use tracing::{debug, info};

/// Result of one reclaim step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReclaimOutcome {
    Deleted { name: UnitName, bytes: u64 },
    /// Nothing large enough to count as a unit; the step is a no-op.
    NoCandidate,
}

/// Pick the unit to delete: the greatest name.
///
/// For `OsString` names on Unix the order is byte-wise, so names that are
/// not valid UTF-8 still take part.
#[must_use]
pub fn select_victim<T, I>(names: I) -> Option<T>
where
    T: Ord,
    I: IntoIterator<Item = T>,
{
    let mut names: Vec<T> = names.into_iter().collect();
    names.sort();
    names.pop()
}

/// Reclaimable units in `dir`, with their sizes, in directory order.
///
/// Symlinks and directories are skipped. Names are kept as raw bytes.
pub fn list_candidates(
    dir: &ReservedDir,
    geometry: &UnitGeometry,
) -> Result<Vec<(OsString, u64)>> {
    let threshold = geometry.min_reclaim_bytes();
    let mut candidates = Vec::new();

    for entry in fs::read_dir(dir.path())? {
        let entry = entry?;
        // DirEntry::metadata does not follow symlinks.
        let meta = entry.metadata()?;
        if !meta.is_file() || meta.len() < threshold {
            continue;
        }
        candidates.push((entry.file_name(), meta.len()));
    }

    Ok(candidates)
}

/// Delete one unit from `dir`.
pub fn reclaim_unit(dir: &ReservedDir, geometry: &UnitGeometry) -> Result<ReclaimOutcome> {
    dir.require()?;

    let candidates = list_candidates(dir, geometry)?;
    let Some((victim, bytes)) = select_victim(candidates) else {
        info!(dir = %dir.path().display(), "no files to delete");
        return Ok(ReclaimOutcome::NoCandidate);
    };

    fs::remove_file(dir.path().join(&victim))?;
    let name = UnitName::from(victim.to_string_lossy().into_owned());
    debug!(unit = %name, bytes, "unit deleted");
    Ok(ReclaimOutcome::Deleted { name, bytes })
}
