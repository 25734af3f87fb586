//! Train/validation/test split ratios.
//!
//! The three ratios always sum to one. Moving one ratio hands the difference
//! to the other splits that are not locked, proportionally to their current
//! share.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tolerance used when checking that ratios sum to one.
pub const RATIO_TOLERANCE: f64 = 1e-9;

/// One of the three dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// The two splits that are not `self`, in declaration order.
    pub fn others(&self) -> [Split; 2] {
        match self {
            Split::Train => [Split::Val, Split::Test],
            Split::Val => [Split::Train, Split::Test],
            Split::Test => [Split::Train, Split::Val],
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" | "training" => Ok(Split::Train),
            "val" | "validation" => Ok(Split::Val),
            "test" | "testing" => Ok(Split::Test),
            other => Err(ConfigError::UnknownSplit(other.to_string())),
        }
    }
}

/// Current ratio of each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Self {
        Self { train, val, test }
    }

    pub fn get(&self, split: Split) -> f64 {
        match split {
            Split::Train => self.train,
            Split::Val => self.val,
            Split::Test => self.test,
        }
    }

    pub fn set(&mut self, split: Split, value: f64) {
        match split {
            Split::Train => self.train = value,
            Split::Val => self.val = value,
            Split::Test => self.test = value,
        }
    }

    pub fn sum(&self) -> f64 {
        self.train + self.val + self.test
    }

    /// True when the ratios sum to one within [`RATIO_TOLERANCE`].
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= RATIO_TOLERANCE
    }
}

/// Lock flag of each split. A locked split keeps its ratio when another
/// split moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitLocks {
    pub train: bool,
    pub val: bool,
    pub test: bool,
}

impl SplitLocks {
    pub fn get(&self, split: Split) -> bool {
        match split {
            Split::Train => self.train,
            Split::Val => self.val,
            Split::Test => self.test,
        }
    }

    pub fn set(&mut self, split: Split, locked: bool) {
        match split {
            Split::Train => self.train = locked,
            Split::Val => self.val = locked,
            Split::Test => self.test = locked,
        }
    }
}

/// Move one split to a new ratio and redistribute the rest.
///
/// # Arguments
/// * `ratios` - Current ratios (expected to sum to one)
/// * `locks` - Lock flag of each split
/// * `changed` - The split being moved
/// * `value` - Requested ratio for `changed`, in `[0, 1]`
///
/// # Returns
/// The new ratios. The requested value is clamped so that locked splits keep
/// their share; the remaining mass goes to the unlocked other splits
/// proportionally to their current values, or equally when they are all zero.
/// When both other splits are locked, `changed` takes whatever they leave.
///
/// # Errors
/// * `ConfigError::RatioLocked` if `changed` itself is locked
/// * `ConfigError::RatioOutOfRange` if `value` is not a number in `[0, 1]`
pub fn redistribute(
    ratios: SplitRatios,
    locks: SplitLocks,
    changed: Split,
    value: f64,
) -> Result<SplitRatios, ConfigError> {
    if locks.get(changed) {
        return Err(ConfigError::RatioLocked { split: changed });
    }
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::RatioOutOfRange { value });
    }

    let others: [Split; 2] = changed.others();
    let locked_sum: f64 = others
        .iter()
        .filter(|s| locks.get(**s))
        .map(|s| ratios.get(*s))
        .sum();
    let unlocked: Vec<Split> = others.into_iter().filter(|s| !locks.get(*s)).collect();
    let available: f64 = (1.0 - locked_sum).clamp(0.0, 1.0);

    let mut result: SplitRatios = ratios;

    if unlocked.is_empty() {
        result.set(changed, available);
        return Ok(result);
    }

    let new_value: f64 = value.min(available);
    let remaining: f64 = (available - new_value).max(0.0);
    result.set(changed, new_value);

    let unlocked_sum: f64 = unlocked.iter().map(|s| ratios.get(*s)).sum();
    let count: usize = unlocked.len();

    // The last unlocked split absorbs rounding so the sum stays exact.
    let mut assigned: f64 = 0.0;
    for (i, split) in unlocked.iter().enumerate() {
        let share: f64 = if i + 1 == count {
            remaining - assigned
        } else if unlocked_sum > 0.0 {
            ratios.get(*split) / unlocked_sum * remaining
        } else {
            remaining / count as f64
        };
        let share: f64 = share.max(0.0);
        assigned += share;
        result.set(*split, share);
    }

    Ok(result)
}
