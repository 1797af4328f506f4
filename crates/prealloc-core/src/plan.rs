//! Direction and size of a convergence run.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// What one loop iteration does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Allocate,
    Reclaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", content = "units", rename_all = "snake_case")]
pub enum ConvergencePlan {
    /// Allocate this many units.
    Grow(u64),
    /// Reclaim this many units.
    Shrink(u64),
    Hold,
}

impl ConvergencePlan {
    #[must_use]
    pub fn between(target_gib: u64, used_gib: u64) -> Self {
        match target_gib.cmp(&used_gib) {
            Ordering::Greater => Self::Grow(target_gib - used_gib),
            Ordering::Less => Self::Shrink(used_gib - target_gib),
            Ordering::Equal => Self::Hold,
        }
    }

    #[must_use]
    pub fn units(&self) -> u64 {
        match self {
            Self::Grow(units) | Self::Shrink(units) => *units,
            Self::Hold => 0,
        }
    }

    /// The repeated step and how often to run it; `None` for `Hold`.
    #[must_use]
    pub fn step(&self) -> Option<(Step, u64)> {
        match *self {
            Self::Grow(units) => Some((Step::Allocate, units)),
            Self::Shrink(units) => Some((Step::Reclaim, units)),
            Self::Hold => None,
        }
    }
}
