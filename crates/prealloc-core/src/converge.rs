//! The timed convergence loop.

use crate::plan::{ConvergencePlan, Step};
use prealloc_alloc::{ReservedDir, allocate_unit};
use prealloc_error::Result;
use prealloc_reclaim::{ReclaimOutcome, reclaim_unit};
use prealloc_types::{FillMode, MonotonicClock, NameClock, UnitGeometry};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// The two unit operations the loop drives.
pub trait UnitOps {
    fn allocate(&mut self) -> Result<()>;
    fn reclaim(&mut self) -> Result<ReclaimOutcome>;
}

/// Unit operations against a real reserved directory.
#[derive(Debug, Clone)]
pub struct FsUnitOps<N> {
    dir: ReservedDir,
    fill: FillMode,
    geometry: UnitGeometry,
    names: N,
}

impl<N: NameClock> FsUnitOps<N> {
    pub fn new(dir: ReservedDir, fill: FillMode, geometry: UnitGeometry, names: N) -> Self {
        Self {
            dir,
            fill,
            geometry,
            names,
        }
    }
}

impl<N: NameClock> UnitOps for FsUnitOps<N> {
    fn allocate(&mut self) -> Result<()> {
        allocate_unit(&self.dir, self.fill, &self.geometry, &self.names).map(|_| ())
    }

    fn reclaim(&mut self) -> Result<ReclaimOutcome> {
        reclaim_unit(&self.dir, &self.geometry)
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub target_gib: u64,
    pub used_gib: u64,
    pub plan: ConvergencePlan,
    /// Iterations that ran to completion.
    pub completed: u64,
    /// Reclaim iterations that found nothing to delete.
    pub reclaim_noops: u64,
    pub unit_elapsed_ms: Vec<u64>,
    /// The last iteration exceeded the slow-unit limit and the loop stopped.
    pub stopped_slow: bool,
}

impl RunReport {
    fn new(target_gib: u64, used_gib: u64, plan: ConvergencePlan) -> Self {
        Self {
            target_gib,
            used_gib,
            plan,
            completed: 0,
            reclaim_noops: 0,
            unit_elapsed_ms: Vec::new(),
            stopped_slow: false,
        }
    }
}

/// Runs a plan one unit at a time and stops early on a slow unit.
#[derive(Debug)]
pub struct Converger<O, C> {
    ops: O,
    clock: C,
    slow_unit_limit: Duration,
}

impl<O: UnitOps, C: MonotonicClock> Converger<O, C> {
    pub fn new(ops: O, clock: C, slow_unit_limit: Duration) -> Self {
        Self {
            ops,
            clock,
            slow_unit_limit,
        }
    }

    #[cfg(test)]
    fn ops(&self) -> &O {
        &self.ops
    }

    /// Move usage from `used_gib` toward `target_gib`.
    ///
    /// Iterations run strictly in sequence. An iteration whose measured time
    /// is strictly greater than the slow-unit limit ends the run successfully
    /// with `stopped_slow` set; work already done stays done. The first
    /// operation error ends the run with that error.
    pub fn execute(&mut self, target_gib: u64, used_gib: u64) -> Result<RunReport> {
        let plan = ConvergencePlan::between(target_gib, used_gib);
        let mut report = RunReport::new(target_gib, used_gib, plan);

        let Some((step, units)) = plan.step() else {
            info!(target_gib, used_gib, "usage already at target");
            return Ok(report);
        };
        info!(?step, units, target_gib, used_gib, "converging in 1 GiB units");

        for index in 1..=units {
            let started = self.clock.now();
            match step {
                Step::Allocate => self.ops.allocate()?,
                Step::Reclaim => {
                    if self.ops.reclaim()? == ReclaimOutcome::NoCandidate {
                        report.reclaim_noops += 1;
                    }
                }
            }
            let elapsed = self.clock.now().saturating_sub(started);

            report.completed += 1;
            report
                .unit_elapsed_ms
                .push(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
            info!(unit = index, of = units, ?elapsed, "unit done");

            if elapsed > self.slow_unit_limit {
                warn!(
                    unit = index,
                    ?elapsed,
                    limit = ?self.slow_unit_limit,
                    "disk too slow, stopping"
                );
                report.stopped_slow = true;
                break;
            }
        }

        Ok(report)
    }
}
