use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::RowOutcome;

/// Explicit per-run accumulator of row outcomes, threaded through the
/// pipeline and returned instead of mutating shared state. The summary is
/// a simple tally over the closed `RowOutcome` variant.
#[derive(Debug, Clone, Default)]
pub struct RunAccumulator {
    total: usize,
    outcomes: Vec<(usize, RowOutcome)>,
}

impl RunAccumulator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            outcomes: Vec::with_capacity(total),
        }
    }

    pub fn record(&mut self, row_index: usize, outcome: RowOutcome) {
        self.outcomes.push((row_index, outcome));
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcomes(&self) -> &[(usize, RowOutcome)] {
        &self.outcomes
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.total,
            ..RunSummary::default()
        };
        for (_, outcome) in &self.outcomes {
            match outcome {
                RowOutcome::Success { .. } => summary.success += 1,
                RowOutcome::ValidationError | RowOutcome::CommitError { .. } => {
                    summary.errors += 1
                }
                RowOutcome::Duplicate => summary.duplicates += 1,
            }
        }
        // Rows never reached, e.g. when a run is aborted between rows
        summary.skipped = self.total - self.outcomes.len();
        summary
    }
}

/// Final row counts by outcome category. For a completed run,
/// success + errors + duplicates equals the total input row count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Live run progress. Purely observational; holds no authority over commit
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

/// Observes a run as the batch importer advances. Cheap to clone a handle
/// from; the importer ticks it once per row in file order.
pub struct RunReporter {
    total: usize,
    processed: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub struct ProgressHandle {
    processed: Arc<AtomicUsize>,
}

impl ProgressHandle {
    pub fn tick(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }
}

impl RunReporter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn handle(&self) -> ProgressHandle {
        ProgressHandle {
            processed: Arc::clone(&self.processed),
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            processed: self.processed.load(Ordering::Relaxed),
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn summary_tallies_outcomes() {
        let mut acc = RunAccumulator::new(4);
        acc.record(1, RowOutcome::Success { record_id: Uuid::new_v4() });
        acc.record(2, RowOutcome::ValidationError);
        acc.record(3, RowOutcome::Duplicate);
        acc.record(4, RowOutcome::CommitError { reason: "constraint".into() });

        let summary = acc.summary();
        assert_eq!(summary.success, 1);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(
            summary.success + summary.errors + summary.duplicates,
            summary.total
        );
    }

    #[test]
    fn aborted_run_reports_skipped_rows() {
        let mut acc = RunAccumulator::new(10);
        acc.record(1, RowOutcome::Success { record_id: Uuid::new_v4() });
        assert_eq!(acc.summary().skipped, 9);
    }

    #[test]
    fn progress_ticks_through_handle() {
        let reporter = RunReporter::new(3);
        let handle = reporter.handle();
        assert_eq!(reporter.progress(), Progress { processed: 0, total: 3 });
        handle.tick();
        handle.tick();
        assert_eq!(reporter.progress(), Progress { processed: 2, total: 3 });
    }
}
