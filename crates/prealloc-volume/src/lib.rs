#![forbid(unsafe_code)]
//! Volume inspection.
//!
//! Reads total and free capacity of the filesystem holding a path and
//! derives whole gibibytes in use. Numbers are queried live on every call.

use nix::sys::statvfs::statvfs;
use prealloc_error::{PreallocError, Result};
use prealloc_types::GIB;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Capacity snapshot of one volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl VolumeUsage {
    #[must_use]
    pub const fn new(total_bytes: u64, free_bytes: u64) -> Self {
        Self {
            total_bytes,
            free_bytes,
        }
    }

    #[must_use]
    pub const fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    /// Used space in whole GiB, rounded down.
    #[must_use]
    pub const fn used_gib(&self) -> u64 {
        self.used_bytes() / GIB
    }
}

/// Source of volume statistics.
pub trait VolumeStats {
    fn usage(&self, path: &Path) -> Result<VolumeUsage>;
}

impl<S: VolumeStats + ?Sized> VolumeStats for &S {
    fn usage(&self, path: &Path) -> Result<VolumeUsage> {
        (**self).usage(path)
    }
}

/// `statvfs(2)`-backed statistics.
///
/// Free space counts every free block, including those reserved for the
/// superuser.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsStats;

impl VolumeStats for StatvfsStats {
    fn usage(&self, path: &Path) -> Result<VolumeUsage> {
        let stat = statvfs(path)
            .map_err(|errno| PreallocError::statistics(path, std::io::Error::from(errno)))?;

        let fragment = u64::from(stat.fragment_size());
        let overflow = || {
            PreallocError::statistics(
                path,
                std::io::Error::other("block count times fragment size overflows u64"),
            )
        };
        let total_bytes = u64::from(stat.blocks())
            .checked_mul(fragment)
            .ok_or_else(overflow)?;
        let free_bytes = u64::from(stat.blocks_free())
            .checked_mul(fragment)
            .ok_or_else(overflow)?;

        let usage = VolumeUsage::new(total_bytes, free_bytes);
        debug!(
            path = %path.display(),
            total_bytes,
            free_bytes,
            used_gib = usage.used_gib(),
            "volume statistics"
        );
        Ok(usage)
    }
}

/// Whole GiB currently used on the volume holding `path`.
pub fn used_gib(stats: &impl VolumeStats, path: &Path) -> Result<u64> {
    stats.usage(path).map(|usage| usage.used_gib())
}
