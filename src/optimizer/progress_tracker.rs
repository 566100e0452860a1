//! # Progress Tracking Module
//!
//! Aggregatore degli esiti di un run: unico consumatore del canale degli
//! `Outcome`, aggiorna il `RunSummary` e inoltra ogni esito al reporter.

use crate::{
    progress::{ProgressReporter, RunSummary},
    task::{Outcome, OutcomeKind},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Single-owner tracker; lives in the run's aggregation task
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    summary: RunSummary,
}

impl ProgressTracker {
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            summary: RunSummary::default(),
        }
    }

    /// Registra un esito e lo inoltra al reporter
    pub fn record(&mut self, outcome: &Outcome) {
        self.summary.record(outcome);
        if outcome.kind != OutcomeKind::Succeeded {
            debug!(
                "{} ended {}: {}",
                outcome.task.relative_path.display(),
                outcome.kind.as_str(),
                outcome.error.as_deref().unwrap_or("no details")
            );
        }
        self.reporter.on_task_outcome(outcome);
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Chiude il run e restituisce le statistiche finali
    pub fn finish(mut self, stopped: bool, discarded: u64, elapsed: Duration) -> RunSummary {
        self.summary.stopped = stopped;
        self.summary.discarded = discarded;
        self.summary.elapsed_seconds = elapsed.as_secs_f64();
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use crate::task::{Disposition, Task};
    use std::path::PathBuf;

    #[test]
    fn test_tracker_aggregates_and_finishes() {
        let mut tracker = ProgressTracker::new(Arc::new(SilentReporter));
        for index in 0..3 {
            tracker.record(&Outcome {
                task: Task {
                    index,
                    input_path: PathBuf::from(format!("/in/{}.png", index)),
                    relative_path: PathBuf::from(format!("{}.png", index)),
                },
                disposition: Disposition::Copy,
                kind: OutcomeKind::Succeeded,
                bytes_in: 10,
                bytes_out: 10,
                elapsed: Duration::ZERO,
                error: None,
            });
        }
        assert_eq!(tracker.summary().copied, 3);

        let summary = tracker.finish(true, 4, Duration::from_millis(1500));
        assert!(summary.stopped);
        assert_eq!(summary.discarded, 4);
        assert_eq!(summary.files_processed(), 3);
        assert_eq!(summary.elapsed_seconds, 1.5);
        assert_eq!(summary.bytes_in, 30);
    }
}
