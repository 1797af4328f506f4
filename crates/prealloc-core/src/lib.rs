#![forbid(unsafe_code)]
//! Capacity convergence.
//!
//! Reads how many GiB the volume uses, compares that with the target, and
//! allocates or reclaims 1 GiB filler units until the two meet. Each unit
//! operation is timed; one that takes longer than the slow-unit limit ends
//! the run early without an error.
//!
//! ## Layers
//!
//! 1. **Plan** ([`ConvergencePlan`]) pure arithmetic on target and used GiB.
//! 2. **Loop** ([`Converger`]) runs the plan through a [`UnitOps`]
//!    implementation and a [`MonotonicClock`](prealloc_types::MonotonicClock).
//! 3. **Run** ([`run`]) wires a [`PreallocConfig`] to the real volume
//!    statistics, allocator, and reclaimer.

mod converge;
mod plan;

pub use converge::{Converger, FsUnitOps, RunReport, UnitOps};
pub use plan::{ConvergencePlan, Step};

use prealloc_alloc::ReservedDir;
use prealloc_error::Result;
use prealloc_types::{
    FillMode, InstantClock, MonotonicClock, NameClock, SLOW_UNIT_LIMIT, SystemNameClock,
    UnitGeometry,
};
use prealloc_volume::{VolumeStats, used_gib};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_VOLUME: &str = "/mnt";
pub const DEFAULT_TARGET_GIB: u64 = 256;

/// Everything a run needs. Built by the CLI; nothing here reads flags or
/// the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreallocConfig {
    /// Mount path of the volume to fill.
    pub volume: PathBuf,
    /// Desired total usage in GiB.
    pub target_gib: u64,
    pub fill: FillMode,
    pub slow_unit_limit: Duration,
    pub geometry: UnitGeometry,
}

impl Default for PreallocConfig {
    fn default() -> Self {
        Self {
            volume: PathBuf::from(DEFAULT_VOLUME),
            target_gib: DEFAULT_TARGET_GIB,
            fill: FillMode::Zero,
            slow_unit_limit: SLOW_UNIT_LIMIT,
            geometry: UnitGeometry::GIB,
        }
    }
}

/// Converge the configured volume using the system clocks.
pub fn run(config: &PreallocConfig, stats: &impl VolumeStats) -> Result<RunReport> {
    run_with_clocks(config, stats, SystemNameClock, InstantClock::new())
}

/// [`run`] with injected clocks for unit names and unit timing.
pub fn run_with_clocks<N, C>(
    config: &PreallocConfig,
    stats: &impl VolumeStats,
    names: N,
    clock: C,
) -> Result<RunReport>
where
    N: NameClock,
    C: MonotonicClock,
{
    let used = used_gib(stats, &config.volume)?;
    let ops = FsUnitOps::new(
        ReservedDir::for_volume(&config.volume),
        config.fill,
        config.geometry,
        names,
    );
    Converger::new(ops, clock, config.slow_unit_limit).execute(config.target_gib, used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prealloc_error::PreallocError;
    use prealloc_types::{GIB, KIB};
    use prealloc_volume::VolumeUsage;
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;

    const SMALL: UnitGeometry = UnitGeometry {
        chunk_bytes: 4 * KIB,
        chunks_per_unit: 4,
        reclaim_slack_bytes: 0,
    };

    /// Reports `base_gib` plus one GiB per full unit in the reserved
    /// directory, as a real volume would if units were 1 GiB.
    struct UnitCountingStats {
        base_gib: u64,
    }

    impl VolumeStats for UnitCountingStats {
        fn usage(&self, path: &Path) -> Result<VolumeUsage> {
            let dir = ReservedDir::for_volume(path);
            let units = match fs::read_dir(dir.path()) {
                Ok(entries) => entries
                    .filter_map(std::result::Result::ok)
                    .filter(|e| e.metadata().is_ok_and(|m| m.len() >= SMALL.unit_bytes()))
                    .count() as u64,
                Err(_) => 0,
            };
            let total = 1024 * GIB;
            Ok(VolumeUsage::new(total, total - (self.base_gib + units) * GIB))
        }
    }

    struct FailingStats;

    impl VolumeStats for FailingStats {
        fn usage(&self, path: &Path) -> Result<VolumeUsage> {
            Err(PreallocError::statistics(
                path,
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ))
        }
    }

    struct CountingNames(Cell<u128>);

    impl NameClock for CountingNames {
        fn unix_nanos(&self) -> Option<u128> {
            let next = self.0.get() + 1;
            self.0.set(next);
            Some(next)
        }
    }

    fn config_for(volume: &Path, target_gib: u64) -> PreallocConfig {
        PreallocConfig {
            volume: volume.to_path_buf(),
            target_gib,
            geometry: SMALL,
            ..PreallocConfig::default()
        }
    }

    fn unit_names(volume: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(ReservedDir::for_volume(volume).path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn defaults_match_command_line_defaults() {
        let config = PreallocConfig::default();
        assert_eq!(config.volume, PathBuf::from("/mnt"));
        assert_eq!(config.target_gib, 256);
        assert_eq!(config.fill, FillMode::Zero);
        assert_eq!(config.slow_unit_limit, Duration::from_secs(600));
        assert_eq!(config.geometry.unit_bytes(), GIB);
    }

    #[test]
    fn grow_then_rerun_is_idempotent() {
        let volume = tempfile::tempdir().unwrap();
        let stats = UnitCountingStats { base_gib: 5 };
        let config = config_for(volume.path(), 8);
        let names = CountingNames(Cell::new(0));

        let first = run_with_clocks(&config, &stats, &names, InstantClock::new()).unwrap();
        assert_eq!(first.plan, ConvergencePlan::Grow(3));
        assert_eq!(first.completed, 3);
        assert_eq!(unit_names(volume.path()), vec!["1", "2", "3"]);

        let second = run_with_clocks(&config, &stats, &names, InstantClock::new()).unwrap();
        assert_eq!(second.used_gib, 8);
        assert_eq!(second.plan, ConvergencePlan::Hold);
        assert_eq!(second.completed, 0);
        assert_eq!(unit_names(volume.path()).len(), 3);
    }

    #[test]
    fn shrink_removes_lexicographically_greatest_units() {
        let volume = tempfile::tempdir().unwrap();
        let stats = UnitCountingStats { base_gib: 2 };
        let names = CountingNames(Cell::new(0xffd));

        run_with_clocks(&config_for(volume.path(), 6), &stats, &names, InstantClock::new())
            .unwrap();
        assert_eq!(unit_names(volume.path()), vec!["1000", "1001", "ffe", "fff"]);

        let report =
            run_with_clocks(&config_for(volume.path(), 4), &stats, &names, InstantClock::new())
                .unwrap();
        assert_eq!(report.plan, ConvergencePlan::Shrink(2));
        assert_eq!(report.reclaim_noops, 0);
        // "fff" and "ffe" sort last even though "1000" and "1001" are newer.
        assert_eq!(unit_names(volume.path()), vec!["1000", "1001"]);
    }

    #[test]
    fn shrink_without_reserved_dir_is_configuration_error() {
        let volume = tempfile::tempdir().unwrap();
        let stats = UnitCountingStats { base_gib: 4 };

        let err = run(&config_for(volume.path(), 1), &stats).unwrap_err();
        assert!(matches!(err, PreallocError::Configuration { .. }));
    }

    #[test]
    fn statistics_failure_stops_before_any_unit() {
        let volume = tempfile::tempdir().unwrap();

        let err = run(&config_for(volume.path(), 10), &FailingStats).unwrap_err();
        assert!(matches!(err, PreallocError::Statistics { .. }));
        assert!(!ReservedDir::for_volume(volume.path()).path().exists());
    }

    #[test]
    fn blocked_reserved_dir_fails_without_units() {
        let volume = tempfile::tempdir().unwrap();
        fs::write(ReservedDir::for_volume(volume.path()).path(), b"").unwrap();

        let err = run(&config_for(volume.path(), 3), &UnitCountingStats { base_gib: 0 })
            .unwrap_err();
        assert!(matches!(err, PreallocError::Configuration { .. }));
    }

    #[test]
    fn report_serializes() {
        let volume = tempfile::tempdir().unwrap();
        let report = run(&config_for(volume.path(), 0), &UnitCountingStats { base_gib: 0 }).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["plan"]["direction"], "hold");
        assert_eq!(json["completed"], 0);
        assert_eq!(json["stopped_slow"], false);
    }
}
