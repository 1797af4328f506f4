#![forbid(unsafe_code)]
//! Filler unit allocation.
//!
//! One call to [`allocate_unit`] creates one unit: a new file in the
//! reserved directory, written as `chunks_per_unit` sequential chunks and
//! forced to stable storage before returning. The fsync is part of the
//! operation, so callers timing it measure device latency rather than page
//! cache speed.
//!
//! A failure part-way leaves the short file behind. It is smaller than a
//! unit and the reclaimer never counts it.

mod reserved;

pub use reserved::ReservedDir;

use prealloc_error::{PreallocError, Result};
use prealloc_types::{FillMode, NameClock, UnitGeometry, UnitName};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// A fully written and synced filler unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedUnit {
    pub name: UnitName,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Prepare `chunk` for the next write.
///
/// Zero mode relies on the buffer never having been touched.
fn fill_chunk(mode: FillMode, chunk: &mut [u8]) -> Result<()> {
    match mode {
        FillMode::Zero => Ok(()),
        FillMode::Random => OsRng
            .try_fill_bytes(chunk)
            .map_err(|err| PreallocError::Io(std::io::Error::from(err))),
    }
}

/// Create one filler unit in `dir`.
///
/// The file is opened with `create_new`: a name collision with an existing
/// unit is an I/O error instead of a silent truncation.
pub fn allocate_unit(
    dir: &ReservedDir,
    mode: FillMode,
    geometry: &UnitGeometry,
    names: &impl NameClock,
) -> Result<AllocatedUnit> {
    dir.ensure()?;

    let name = names
        .next_name()
        .ok_or_else(|| PreallocError::Clock("system clock reads before the Unix epoch".into()))?;
    let path = dir.path().join(name.as_str());

    let chunk_len = usize::try_from(geometry.chunk_bytes).map_err(|_| {
        PreallocError::Io(std::io::Error::other(format!(
            "chunk size {} does not fit in memory",
            geometry.chunk_bytes
        )))
    })?;
    let mut chunk = vec![0_u8; chunk_len];

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;
    for _ in 0..geometry.chunks_per_unit {
        fill_chunk(mode, &mut chunk)?;
        file.write_all(&chunk)?;
    }
    file.sync_all()?;

    debug!(unit = %name, %mode, bytes = geometry.unit_bytes(), "unit allocated");
    Ok(AllocatedUnit {
        name,
        path,
        bytes: geometry.unit_bytes(),
    })
}
