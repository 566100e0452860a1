//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione di un singolo run.
//!
//! ## Responsabilità:
//! - Definisce la struct `RunConfig` con tutti i parametri del run
//! - Fornisce valori di default sensati (larghezza 2160, worker = core disponibili)
//! - Valida i parametri prima dell'avvio
//!
//! ## Parametri di configurazione:
//! - `input_root`: Directory sorgente (visitata ricorsivamente)
//! - `output_root`: Directory di destinazione (struttura speculare)
//! - `max_width`: Larghezza massima in pixel dell'output (default: 2160)
//! - `workers`: Numero di worker concorrenti (default: parallelismo disponibile, minimo 1)
//! - `jpeg_quality`: Qualità JPEG per il ri-encoding (1-100, default: 95)
//! - `queue_capacity`: Capacità della coda dei task (default: 2 × workers)
//!
//! ## Immutabilità:
//! Il controller clona la config al momento di `start`; durante il run non cambia mai.
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = RunConfig {
//!     max_width: 1080,
//!     workers: 8,
//!     ..RunConfig::new("/photos", "/photos-small")
//! };
//! config.validate()?;
//! ```

use crate::error::RunError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_WIDTH: u32 = 2160;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Parameters of one compression run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Directory tree to read images from
    pub input_root: PathBuf,
    /// Directory the input tree is mirrored into
    pub output_root: PathBuf,
    /// Maximum width in pixels of a compressed output
    pub max_width: u32,
    /// Number of concurrent workers (0 is treated as 1)
    pub workers: usize,
    /// JPEG quality used when re-encoding a resized image (1-100)
    pub jpeg_quality: u8,
    /// Bound of the task queue between the enumerator and the workers
    pub queue_capacity: usize,
}

impl RunConfig {
    /// Config with default tuning for the given roots
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        let workers = default_workers();
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            max_width: DEFAULT_MAX_WIDTH,
            workers,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            queue_capacity: workers * 2,
        }
    }

    /// Worker count actually used by the pool
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), RunError> {
        if self.max_width == 0 {
            return Err(RunError::InvalidConfig("max width must be greater than 0".to_string()));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(RunError::InvalidConfig("JPEG quality must be between 1 and 100".to_string()));
        }

        if self.queue_capacity == 0 {
            return Err(RunError::InvalidConfig("queue capacity must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Available parallelism, falling back to a single worker
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
