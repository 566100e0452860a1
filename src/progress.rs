//! # Progress Reporting and Statistics Module
//!
//! Questo modulo definisce l'interfaccia verso chi visualizza il run (GUI, CLI)
//! e le statistiche aggregate.
//!
//! ## Responsabilità:
//! - Trait `ProgressReporter`: il core chiama, il reporter visualizza
//! - `RunSummary`: conteggi per esito e byte totali del run
//! - `ProgressManager`: spinner `indicatif` per il terminale
//! - `SilentReporter`: nessun output (test ed embedding)
//!
//! ## Statistiche tracciate:
//! - **skipped**: output già presente
//! - **copied**: copiati così come sono (non JPEG o già abbastanza stretti)
//! - **compressed**: ridimensionati e ricodificati
//! - **fallbacks**: transcoder fallito, originale copiato
//! - **failed**: nessun output scritto
//! - **discarded**: già in coda allo Stop, mai iniziati (nessun esito, li riprende il run successivo)
//! - **bytes_in / bytes_out**: dimensioni totali lette e scritte
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] 150 files [OK] photo.jpg: 45.2% saved
//! ```
//!
//! ## Esempio:
//! ```rust,ignore
//! let reporter: Arc<dyn ProgressReporter> = Arc::new(ProgressManager::new());
//! let controller = RunController::new(transcoder, reporter);
//! ```

use crate::config::RunConfig;
use crate::file_manager::FileManager;
use crate::task::{Disposition, Outcome, OutcomeKind};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

/// Receives the lifecycle of a run. Called from the run's aggregation task.
pub trait ProgressReporter: Send + Sync {
    fn on_run_started(&self, config: &RunConfig);
    fn on_task_outcome(&self, outcome: &Outcome);
    fn on_run_finished(&self, summary: &RunSummary);
}

/// Aggregate statistics of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub skipped: u64,
    pub copied: u64,
    pub compressed: u64,
    pub fallbacks: u64,
    pub failed: u64,
    /// Queued when Stop was requested and never started; not part of `files_processed`
    pub discarded: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub elapsed_seconds: f64,
    /// The run ended because Stop was requested
    pub stopped: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        match (outcome.kind, outcome.disposition) {
            (OutcomeKind::FailedFatal, _) => self.failed += 1,
            (OutcomeKind::FailedFallbackToCopy, _) => self.fallbacks += 1,
            (OutcomeKind::Succeeded, Disposition::Skip) => self.skipped += 1,
            (OutcomeKind::Succeeded, Disposition::Copy) => self.copied += 1,
            (OutcomeKind::Succeeded, Disposition::Compress) => self.compressed += 1,
        }
        self.bytes_in += outcome.bytes_in;
        self.bytes_out += outcome.bytes_out;
    }

    pub fn files_processed(&self) -> u64 {
        self.skipped + self.copied + self.compressed + self.fallbacks + self.failed
    }

    pub fn bytes_saved(&self) -> u64 {
        self.bytes_in.saturating_sub(self.bytes_out)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_in, self.bytes_out).max(0.0)
    }

    pub fn format_summary(&self) -> String {
        let mut summary = format!(
            "Processed: {} files | Compressed: {} | Copied: {} | Skipped: {} | Fallbacks: {} | Failed: {} | Total saved: {} ({:.2}%)",
            self.files_processed(),
            self.compressed,
            self.copied,
            self.skipped,
            self.fallbacks,
            self.failed,
            FileManager::format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        );
        if self.discarded > 0 {
            summary.push_str(&format!(" | Left for next run: {}", self.discarded));
        }
        summary
    }
}

/// Terminal reporter with an animated spinner counting completed files
pub struct ProgressManager {
    bar: ProgressBar,
    completed: AtomicU64,
}

impl ProgressManager {
    /// Log a progress line every this many outcomes
    pub const LOG_EVERY: u64 = 100;

    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self {
            bar,
            completed: AtomicU64::new(0),
        }
    }

    fn message_for(outcome: &Outcome) -> String {
        let name = outcome.file_name();
        match (outcome.kind, outcome.disposition) {
            (OutcomeKind::FailedFatal, _) => format!("[ERROR] {}", name),
            (OutcomeKind::FailedFallbackToCopy, _) => format!("[FALLBACK] {}: copied", name),
            (OutcomeKind::Succeeded, Disposition::Skip) => format!("[SKIP] {}: already done", name),
            (OutcomeKind::Succeeded, Disposition::Copy) => format!("[COPY] {}", name),
            (OutcomeKind::Succeeded, Disposition::Compress) => format!(
                "[OK] {}: {:.1}% saved",
                name,
                FileManager::calculate_reduction(outcome.bytes_in, outcome.bytes_out)
            ),
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ProgressManager {
    fn on_run_started(&self, config: &RunConfig) {
        self.completed.store(0, Ordering::Relaxed);
        self.bar.reset();
        self.bar.set_message(format!("scanning {}", config.input_root.display()));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_task_outcome(&self, outcome: &Outcome) {
        self.bar.inc(1);
        self.bar.set_message(Self::message_for(outcome));

        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if completed % Self::LOG_EVERY == 0 {
            info!("Processed {} files", completed);
        }
    }

    fn on_run_finished(&self, summary: &RunSummary) {
        let prefix = if summary.stopped { "Stopped. " } else { "" };
        self.bar.finish_with_message(format!("{}{}", prefix, summary.format_summary()));
    }
}

/// Reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn on_run_started(&self, _config: &RunConfig) {}
    fn on_task_outcome(&self, _outcome: &Outcome) {}
    fn on_run_finished(&self, _summary: &RunSummary) {}
}
