//! Reports produced by the purge loop.

use crate::error::PurgeError;

/// Why the purge loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A listing came back empty.
    Exhausted,
    /// The shutdown token fired.
    Cancelled,
}

/// What a single delete task did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Failed,
    /// Shutdown fired before the task issued its request.
    Skipped,
}

/// Result of one list-then-delete cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Number of indicators the listing returned.
    pub listed: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// Per-item failures, drained after every task of the cycle has joined.
    pub failures: Vec<PurgeError>,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.listed == 0
    }

    pub(crate) fn record(&mut self, outcome: DeleteOutcome) {
        match outcome {
            DeleteOutcome::Deleted => self.deleted += 1,
            DeleteOutcome::Skipped => self.skipped += 1,
            // Counted when the failure is drained from the channel.
            DeleteOutcome::Failed => {}
        }
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Cycles that listed at least one indicator.
    pub cycles: u64,
    /// Running total reported to the operator: the sum of every cycle's listing
    /// size. Failed and skipped deletes are included, so this over-counts whenever
    /// a cycle is not fully successful. `confirmed` holds the true count.
    pub reported_deleted: usize,
    /// Deletes that returned 200.
    pub confirmed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub stop_reason: StopReason,
}

impl PurgeSummary {
    pub(crate) fn new() -> Self {
        Self {
            cycles: 0,
            reported_deleted: 0,
            confirmed: 0,
            failed: 0,
            skipped: 0,
            stop_reason: StopReason::Exhausted,
        }
    }

    pub(crate) fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.reported_deleted += report.listed;
        self.confirmed += report.deleted;
        self.failed += report.failures.len();
        self.skipped += report.skipped;
    }
}
