//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom della pipeline.
//!
//! ## Responsabilità:
//! - `RunError`: errori a livello di run (validazione root, run già attivo, config)
//! - `TranscodeError`: errori per singolo file del transcoder (probe/encode)
//! - Integra con `thiserror` per messaggi e conversioni automatiche
//!
//! ## Politica di propagazione:
//! - Solo `RunError` arriva al chiamante di `RunController::start`
//! - `TranscodeError` viene sempre recuperato dal worker con una copia byte-per-byte
//! - Gli errori di scrittura per singolo file diventano `Outcome` con `FailedFatal`
//!
//! ## Esempio:
//! ```rust,ignore
//! match controller.start(config) {
//!     Err(RunError::AlreadyRunning) => info!("A run is already active"),
//!     Err(e) => return Err(e.into()),
//!     Ok(()) => {}
//! }
//! ```

use std::path::PathBuf;

/// Run-level failures surfaced synchronously to the caller of `start`
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("Input root does not exist or is not a directory: {}", .0.display())]
    InvalidInputRoot(PathBuf),

    #[error("Cannot prepare output root {}: {source}", .path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A run is already active")]
    AlreadyRunning,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Per-file failures reported by a `Transcoder`
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("Unreadable image: {0}")]
    Unreadable(String),

    #[error("Encode failure: {0}")]
    EncodeFailure(String),
}
