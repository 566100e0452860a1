//! # Task and Outcome Types
//!
//! Tipi di dati che attraversano la pipeline.
//!
//! ## Ciclo di vita:
//! - `Task`: creato dall'enumeratore, passato a un solo worker tramite la coda
//! - `Disposition`: decisione del classificatore (Compress / Copy / Skip)
//! - `Outcome`: risultato di un task, prodotto esattamente una volta e consumato
//!   dall'aggregatore e dal reporter

use std::path::PathBuf;
use std::time::Duration;

/// One discovered input file awaiting processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Discovery order within the run, for reproducible logging only
    pub index: u64,
    /// Absolute path of the input file
    pub input_path: PathBuf,
    /// Path relative to the input root, replayed under the output root
    pub relative_path: PathBuf,
}

/// Classifier decision for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Compress,
    Copy,
    Skip,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Compress => "compress",
            Disposition::Copy => "copy",
            Disposition::Skip => "skip",
        }
    }
}

/// How processing of a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Succeeded,
    /// The transcoder could not probe or compress the file; the original was copied
    FailedFallbackToCopy,
    /// Nothing usable was written for this file
    FailedFatal,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Succeeded => "succeeded",
            OutcomeKind::FailedFallbackToCopy => "failed_fallback_to_copy",
            OutcomeKind::FailedFatal => "failed_fatal",
        }
    }
}

/// Recorded result of processing one task
#[derive(Debug, Clone)]
pub struct Outcome {
    pub task: Task,
    pub disposition: Disposition,
    pub kind: OutcomeKind,
    /// Size of the input file, 0 when unknown or skipped
    pub bytes_in: u64,
    /// Size of the written output, 0 when nothing was written
    pub bytes_out: u64,
    pub elapsed: Duration,
    /// Description of the failure behind a non-`Succeeded` kind
    pub error: Option<String>,
}

impl Outcome {
    pub fn file_name(&self) -> String {
        self.task
            .relative_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }
}
