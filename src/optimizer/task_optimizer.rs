//! # Task Optimizer Module
//!
//! Worker per l'elaborazione di singoli file.
//! Applica il classificatore, poi salta, copia o comprime; ogni errore
//! per file viene contenuto qui e trasformato in un `Outcome`.
//!
//! ## Esiti:
//! - `Skip` → `Succeeded`, dimensioni 0
//! - `Copy` → copia byte-per-byte (`FailedFallbackToCopy` se il probe era fallito)
//! - `Compress` → scrive i byte del transcoder; se fallisce ripiega sulla copia
//! - Scrittura impossibile → `FailedFatal`, il run continua

use crate::{
    classifier::{classify, Reason},
    error::TranscodeError,
    file_manager::FileManager,
    image_processor::Transcoder,
    task::{Disposition, Outcome, OutcomeKind, Task},
};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Processes single tasks; shared by all workers of a run
#[derive(Clone)]
pub struct TaskOptimizer {
    output_root: PathBuf,
    max_width: u32,
    transcoder: Arc<dyn Transcoder>,
}

impl TaskOptimizer {
    pub fn new(output_root: PathBuf, max_width: u32, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            output_root,
            max_width,
            transcoder,
        }
    }

    /// Processa un singolo file. Blocking: call from a blocking thread.
    pub fn process(&self, task: Task) -> Outcome {
        let started = Instant::now();
        let classification = classify(
            &task.input_path,
            &task.relative_path,
            &self.output_root,
            self.max_width,
            self.transcoder.as_ref(),
        );
        let output_path = classification.output_path;

        debug!(
            "#{} {} -> {} ({:?})",
            task.index,
            task.relative_path.display(),
            classification.disposition.as_str(),
            classification.reason
        );

        let mut outcome = match classification.disposition {
            Disposition::Skip => Outcome {
                task,
                disposition: Disposition::Skip,
                kind: OutcomeKind::Succeeded,
                bytes_in: 0,
                bytes_out: 0,
                elapsed: Default::default(),
                error: None,
            },
            Disposition::Copy => {
                let probe_error = match classification.reason {
                    Reason::ProbeFailed(e) => Some(e),
                    _ => None,
                };
                self.copy(task, Disposition::Copy, &output_path, probe_error)
            }
            Disposition::Compress => self.compress(task, &output_path),
        };

        outcome.elapsed = started.elapsed();
        outcome
    }

    /// Comprime e scrive l'output, con fallback sulla copia
    fn compress(&self, task: Task, output_path: &Path) -> Outcome {
        let bytes = match guarded(|| self.transcoder.compress(&task.input_path, self.max_width)) {
            Ok(bytes) => bytes,
            Err(e) => return self.copy(task, Disposition::Compress, output_path, Some(e)),
        };

        let bytes_in = input_size(&task.input_path);
        match FileManager::write_atomic(&task.input_path, output_path, &bytes) {
            Ok(bytes_out) => {
                debug!(
                    "Compressed {}: {:.1}% saved",
                    task.relative_path.display(),
                    FileManager::calculate_reduction(bytes_in, bytes_out)
                );
                Outcome {
                    task,
                    disposition: Disposition::Compress,
                    kind: OutcomeKind::Succeeded,
                    bytes_in,
                    bytes_out,
                    elapsed: Default::default(),
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to write {}: {}", output_path.display(), e);
                Outcome {
                    task,
                    disposition: Disposition::Compress,
                    kind: OutcomeKind::FailedFatal,
                    bytes_in,
                    bytes_out: 0,
                    elapsed: Default::default(),
                    error: Some(format!("write {}: {}", output_path.display(), e)),
                }
            }
        }
    }

    /// Copia byte-per-byte; `transcode_error` marca l'esito come fallback
    fn copy(
        &self,
        task: Task,
        disposition: Disposition,
        output_path: &Path,
        transcode_error: Option<TranscodeError>,
    ) -> Outcome {
        if let Some(ref e) = transcode_error {
            warn!("Falling back to copy for {}: {}", task.relative_path.display(), e);
        }

        let bytes_in = input_size(&task.input_path);
        match FileManager::copy_atomic(&task.input_path, output_path) {
            Ok(bytes_out) => {
                let kind = if transcode_error.is_some() {
                    OutcomeKind::FailedFallbackToCopy
                } else {
                    OutcomeKind::Succeeded
                };
                Outcome {
                    task,
                    disposition,
                    kind,
                    bytes_in,
                    bytes_out,
                    elapsed: Default::default(),
                    error: transcode_error.map(|e| e.to_string()),
                }
            }
            Err(e) => {
                error!("Failed to copy {} to {}: {}", task.input_path.display(), output_path.display(), e);
                let mut message = format!("copy to {}: {}", output_path.display(), e);
                if let Some(transcode_error) = transcode_error {
                    message = format!("{} (after {})", message, transcode_error);
                }
                Outcome {
                    task,
                    disposition,
                    kind: OutcomeKind::FailedFatal,
                    bytes_in,
                    bytes_out: 0,
                    elapsed: Default::default(),
                    error: Some(message),
                }
            }
        }
    }
}

/// Codec panics are per-file failures like any other encode error
fn guarded<F>(call: F) -> Result<Vec<u8>, TranscodeError>
where
    F: FnOnce() -> Result<Vec<u8>, TranscodeError>,
{
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|_| Err(TranscodeError::EncodeFailure("transcoder panicked".to_string())))
}

fn input_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
