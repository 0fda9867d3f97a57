//! Dispatch outcomes and lock-free counters over them.

use serde::Serialize;
use std::fmt;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why an event was not forwarded to the meter system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The expression evaluator failed
    EvaluationError,
    /// The expression produced no series
    EmptyResult,
    /// The evaluated shape does not fit the operation
    ShapeMismatch,
    /// The operation is not one the meter system supports
    UnsupportedOperation,
    /// The event timestamp has no time bucket
    InvalidTimestamp,
    /// The meter system refused the value
    EngineRejected,
}

impl DropReason {
    pub const ALL: [DropReason; 6] = [
        DropReason::EvaluationError,
        DropReason::EmptyResult,
        DropReason::ShapeMismatch,
        DropReason::UnsupportedOperation,
        DropReason::InvalidTimestamp,
        DropReason::EngineRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::EvaluationError => "evaluation-error",
            DropReason::EmptyResult => "empty-result",
            DropReason::ShapeMismatch => "shape-mismatch",
            DropReason::UnsupportedOperation => "unsupported-operation",
            DropReason::InvalidTimestamp => "invalid-timestamp",
            DropReason::EngineRejected => "engine-rejected",
        }
    }

    fn index(self) -> usize {
        match self {
            DropReason::EvaluationError => 0,
            DropReason::EmptyResult => 1,
            DropReason::ShapeMismatch => 2,
            DropReason::UnsupportedOperation => 3,
            DropReason::InvalidTimestamp => 4,
            DropReason::EngineRejected => 5,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Forwarded,
    Dropped(DropReason),
}

impl DispatchOutcome {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, DispatchOutcome::Forwarded)
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            DispatchOutcome::Forwarded => None,
            DispatchOutcome::Dropped(reason) => Some(*reason),
        }
    }
}

/// Counters of dispatch outcomes, safe to share across workers
#[derive(Debug, Default)]
pub struct DispatchStats {
    forwarded: AtomicU64,
    dropped: [AtomicU64; 6],
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one outcome
    pub fn record(&self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Forwarded => self.forwarded.fetch_add(1, Ordering::Relaxed),
            DispatchOutcome::Dropped(reason) => {
                self.dropped[reason.index()].fetch_add(1, Ordering::Relaxed)
            },
        };
    }

    /// Adds counts gathered elsewhere
    pub fn absorb(&self, snapshot: &StatsSnapshot) {
        self.forwarded.fetch_add(snapshot.forwarded, Ordering::Relaxed);
        for (counter, count) in self.dropped.iter().zip(snapshot.dropped) {
            counter.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut dropped = [0; 6];
        for (slot, counter) in dropped.iter_mut().zip(&self.dropped) {
            *slot = counter.load(Ordering::Relaxed);
        }
        StatsSnapshot {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped,
        }
    }
}

/// Plain copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub forwarded: u64,
    dropped: [u64; 6],
}

impl StatsSnapshot {
    /// Drops counted for one reason
    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.dropped[reason.index()]
    }

    /// Drops counted over all reasons
    pub fn total_dropped(&self) -> u64 {
        self.dropped.iter().sum()
    }

    /// Non-zero drop counters, in reason order
    pub fn drops(&self) -> impl Iterator<Item = (DropReason, u64)> + '_ {
        DropReason::ALL
            .into_iter()
            .map(|reason| (reason, self.dropped(reason)))
            .filter(|(_, count)| *count > 0)
    }
}

impl AddAssign for StatsSnapshot {
    fn add_assign(&mut self, other: Self) {
        self.forwarded += other.forwarded;
        for (mine, theirs) in self.dropped.iter_mut().zip(other.dropped) {
            *mine += theirs;
        }
    }
}
